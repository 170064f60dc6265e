use crate::Image;
use ::image::ImageFormat;
use anyhow::{Context, Result};
use std::path::Path;

impl Image {
    /// Writes the image, picking the format from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path)
            .with_context(|| format!("Unknown image format for {}", path.display()))?;

        self.save_with_format(path, format)
    }

    pub fn save_with_format(&self, path: impl AsRef<Path>, format: ImageFormat) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        self.pixels
            .save_with_format(path, format)
            .with_context(|| format!("Failed to save image {}", path.display()))?;

        Ok(())
    }
}

#[test]
fn test_encoder_and_decoder() -> Result<()> {
    use ::image::{Rgb, RgbImage};

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out").join("tile.png");

    let mut pixels = RgbImage::new(16, 8);
    pixels.put_pixel(3, 4, Rgb([10, 20, 30]));
    Image::from_rgb(pixels).save(&path)?;

    let reread = Image::open_file(&path)?;
    assert_eq!(reread.get_size(), (16, 8));
    assert_eq!(reread.as_rgb().get_pixel(3, 4).0, [10, 20, 30]);
    assert_eq!(reread.file_name().as_deref(), Some("tile.png"));

    Ok(())
}
