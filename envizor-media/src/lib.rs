pub mod image;
pub mod scan;

pub use crate::image::{Image, RGB};
pub use crate::image::decoder::size::{Letterbox, ResizeImage};
