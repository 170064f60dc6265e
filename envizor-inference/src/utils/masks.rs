use crate::utils::graph::Polygon;
use anyhow::{bail, Result};
use bitvec::vec::BitVec;
use envizor_media::{Image, RGB};
use imageproc::drawing::draw_hollow_polygon_mut;
use imageproc::point::Point;
use rayon::prelude::*;

pub trait ApplyMask {
    fn layering_mask(&mut self, mask: &BitVec, apply_color: RGB) -> Result<()>;
    fn outline_polygon(&mut self, polygon: &Polygon, color: RGB) -> Result<()>;
}

impl ApplyMask for Image {
    fn layering_mask(&mut self, mask: &BitVec, apply_color: RGB) -> Result<()> {
        let (width, height) = self.get_size();
        if mask.len() != (width * height) as usize {
            bail!(
                "Mask of {} bits does not cover a {}x{} image",
                mask.len(),
                width,
                height
            );
        }

        let pixels: &mut [u8] = self.as_rgb_mut();
        pixels
            .par_chunks_mut(3)
            .enumerate()
            .filter(|(index, _)| mask[*index])
            .for_each(|(_, pixel)| {
                pixel[0] = pixel[0].saturating_add(apply_color.0);
                pixel[1] = pixel[1].saturating_add(apply_color.1);
                pixel[2] = pixel[2].saturating_add(apply_color.2);
            });

        Ok(())
    }

    fn outline_polygon(&mut self, polygon: &Polygon, color: RGB) -> Result<()> {
        if polygon.len() < Polygon::MIN_VERTICES {
            bail!("Polygon with {} vertices cannot be drawn", polygon.len());
        }

        let points = polygon
            .vertices()
            .iter()
            .map(|p| Point::new(p.x, p.y))
            .collect::<Vec<_>>();
        draw_hollow_polygon_mut(self.as_rgb_mut(), &points, color.into());

        Ok(())
    }
}
