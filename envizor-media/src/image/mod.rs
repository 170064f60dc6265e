pub mod decoder;
pub mod encoder;
#[allow(clippy::module_inception)]
mod image;

pub use self::image::{Image, RGB};
