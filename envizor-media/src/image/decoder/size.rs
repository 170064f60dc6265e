use crate::{Image, RGB};
use ::image::imageops::{self, FilterType};
use ::image::RgbImage;
use anyhow::{bail, Result};

/// Geometry of an aspect-preserving resize onto a square, padded canvas.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub origin_size: (u32, u32),
    pub target: u32,
}

impl Letterbox {
    pub fn new(origin_size: (u32, u32), target: u32) -> Result<Self> {
        let (width, height) = origin_size;
        if width == 0 || height == 0 || target == 0 {
            bail!("Cannot letterbox {}x{} into {}", width, height, target);
        }

        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let (scaled_width, scaled_height) = Self::scaled(origin_size, scale, target);

        Ok(Self {
            scale,
            pad_x: ((target - scaled_width) / 2) as f32,
            pad_y: ((target - scaled_height) / 2) as f32,
            origin_size,
            target,
        })
    }

    fn scaled((width, height): (u32, u32), scale: f32, target: u32) -> (u32, u32) {
        let w = ((width as f32 * scale).round() as u32).clamp(1, target);
        let h = ((height as f32 * scale).round() as u32).clamp(1, target);
        (w, h)
    }

    pub fn scaled_size(&self) -> (u32, u32) {
        Self::scaled(self.origin_size, self.scale, self.target)
    }

    /// Maps a point on the padded canvas back into original pixel space.
    pub fn to_origin(&self, x: f32, y: f32) -> (f32, f32) {
        (
            ((x - self.pad_x) / self.scale).clamp(0.0, self.origin_size.0 as f32),
            ((y - self.pad_y) / self.scale).clamp(0.0, self.origin_size.1 as f32),
        )
    }
}

pub trait ResizeImage {
    fn resize_to(&mut self, size: (u32, u32)) -> Result<()>;
    fn resize_into(&self, size: (u32, u32)) -> Result<Self>
    where
        Self: Sized;
    fn letterbox_into(&self, target: u32, pad: RGB) -> Result<(Self, Letterbox)>
    where
        Self: Sized;
}

impl ResizeImage for Image {
    fn resize_to(&mut self, size: (u32, u32)) -> Result<()> {
        if size.0 == 0 || size.1 == 0 {
            bail!("Cannot resize to {}x{}", size.0, size.1);
        }
        if self.get_size() != size {
            self.pixels = imageops::resize(&self.pixels, size.0, size.1, FilterType::Triangle);
        }

        Ok(())
    }

    fn resize_into(&self, size: (u32, u32)) -> Result<Self> {
        let mut new = self.clone();
        new.resize_to(size)?;
        Ok(new)
    }

    fn letterbox_into(&self, target: u32, pad: RGB) -> Result<(Self, Letterbox)> {
        let letterbox = Letterbox::new(self.get_size(), target)?;
        let (scaled_width, scaled_height) = letterbox.scaled_size();
        let scaled = imageops::resize(&self.pixels, scaled_width, scaled_height, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(target, target, pad.into());
        imageops::replace(
            &mut canvas,
            &scaled,
            letterbox.pad_x as i64,
            letterbox.pad_y as i64,
        );

        Ok((
            Image {
                pixels: canvas,
                source: self.source.clone(),
            },
            letterbox,
        ))
    }
}

impl Image {
    pub fn get_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn get_height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn get_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}
