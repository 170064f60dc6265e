use ::image::RgbImage;
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RGB(pub u8, pub u8, pub u8);

impl From<RGB> for ::image::Rgb<u8> {
    fn from(value: RGB) -> Self {
        ::image::Rgb([value.0, value.1, value.2])
    }
}

/// A decoded RGB8 frame, remembering the file it came from.
#[derive(Debug, Clone)]
pub struct Image {
    pub(crate) pixels: RgbImage,
    pub(crate) source: Option<PathBuf>,
}

impl Image {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            pixels,
            source: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Final path component of the source file, if the image was read from disk.
    pub fn file_name(&self) -> Option<String> {
        self.source
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn raw_data(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn as_rgb_mut(&mut self) -> &mut RgbImage {
        &mut self.pixels
    }

    pub fn into_rgb(self) -> RgbImage {
        self.pixels
    }
}
