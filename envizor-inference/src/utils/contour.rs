use crate::utils::graph::{Point, Polygon};
use bitvec::vec::BitVec;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};

pub trait MaskContour {
    /// Outline of the largest connected region of the mask.
    fn extract_polygon(&self, width: u32, height: u32) -> Option<Polygon>;
}

impl MaskContour for BitVec {
    fn extract_polygon(&self, width: u32, height: u32) -> Option<Polygon> {
        if width == 0 || height == 0 || self.len() != (width * height) as usize {
            return None;
        }

        let gray = GrayImage::from_fn(width, height, |x, y| {
            Luma([if self[(y * width + x) as usize] { 255 } else { 0 }])
        });

        let largest = find_contours::<i64>(&gray)
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer)
            .max_by_key(|contour| contour.points.len())?;

        let chain = largest
            .points
            .iter()
            .map(|p| (p.x, p.y))
            .collect::<Vec<_>>();

        Polygon::new(
            compress_chain(&chain)
                .into_iter()
                .map(|(x, y)| Point::new(x as f32, y as f32))
                .collect(),
        )
    }
}

/// Drops vertices that sit in the middle of a straight run of a closed chain,
/// keeping only the points where the direction changes.
pub fn compress_chain(chain: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut points = chain.to_vec();
    points.dedup();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return points;
    }

    let direction = |a: (i64, i64), b: (i64, i64)| ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    let n = points.len();

    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            direction(prev, points[i]) != direction(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}
