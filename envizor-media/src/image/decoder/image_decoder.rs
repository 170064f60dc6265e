use crate::Image;
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

impl Image {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pixels = ::image::ImageReader::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("Failed to guess format of {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode image {}", path.display()))?
            .into_rgb8();

        debug!(
            "Decoded {} ({}x{})",
            path.display(),
            pixels.width(),
            pixels.height()
        );

        Ok(Image {
            pixels,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let pixels = ::image::load_from_memory(bytes)
            .context("Failed to decode image from memory")?
            .into_rgb8();

        Ok(Image {
            pixels,
            source: None,
        })
    }
}
