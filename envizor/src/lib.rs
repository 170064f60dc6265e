pub mod config;
pub mod dataset;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod train;

pub use error::{Error, Result};
