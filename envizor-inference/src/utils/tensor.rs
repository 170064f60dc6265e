use image::RgbImage;
use ndarray::{Array2, Array4};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Packs an interleaved RGB8 buffer into a `[1, 3, H, W]` tensor, scaling to
/// `[0, 1]` before applying the per-channel mean/std.
pub fn rgb_to_nchw(pixels: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let (width, height) = pixels.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in pixels.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel.0[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }

    tensor
}

pub fn linear_interpolate(input: Array2<f32>, new_shape: (usize, usize)) -> Array2<f32> {
    let (old_height, old_width) = input.dim();
    let (new_height, new_width) = new_shape;
    let mut output = Array2::<f32>::zeros((new_height, new_width));

    if old_height == 0 || old_width == 0 {
        return output;
    }

    for i in 0..new_height {
        for j in 0..new_width {
            // Mapping new coordinates to old coordinates
            let x = (j as f32) / (new_width as f32) * (old_width as f32 - 1.0);
            let y = (i as f32) / (new_height as f32) * (old_height as f32 - 1.0);

            let x0 = x.floor() as usize;
            let x1 = x.ceil() as usize;
            let y0 = y.floor() as usize;
            let y1 = y.ceil() as usize;

            let p00 = input[[y0, x0]];
            let p01 = input[[y0, x1]];
            let p10 = input[[y1, x0]];
            let p11 = input[[y1, x1]];

            let dx = x - x0 as f32;
            let dy = y - y0 as f32;

            output[[i, j]] = p00 * (1.0 - dx) * (1.0 - dy)
                + p01 * dx * (1.0 - dy)
                + p10 * (1.0 - dx) * dy
                + p11 * dx * dy;
        }
    }

    output
}

pub fn sigmoid(arr: Array2<f32>) -> Array2<f32> {
    arr.mapv(|x| 1.0 / (1.0 + (-x).exp()))
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.iter().map(|&v| (v - max).exp()).collect::<Vec<_>>();
    let sum: f32 = exps.iter().sum();

    exps.into_iter().map(|v| v / sum).collect()
}

/// Index and value of the largest element; the first one wins on ties.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((index, value)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn softmax_sums_to_one_and_keeps_order() {
        let probs = softmax(&[1.0, 3.0, 2.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(argmax(&probs).map(|(i, _)| i), Some(1));
        assert!((probs[1] - 0.665_240_9).abs() < 1e-5);
    }

    #[test]
    fn argmax_prefers_first_on_tie() {
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), Some((0, 0.5)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn interpolate_keeps_corners() {
        let input = array![[0.0, 1.0], [2.0, 3.0]];
        let output = linear_interpolate(input, (4, 4));
        assert_eq!(output.dim(), (4, 4));
        assert_eq!(output[[0, 0]], 0.0);
        assert!(output[[3, 3]] > 2.0);
    }

    #[test]
    fn nchw_layout_and_normalisation() {
        let mut pixels = RgbImage::new(2, 1);
        pixels.put_pixel(1, 0, image::Rgb([255, 0, 51]));
        let tensor = rgb_to_nchw(&pixels, [0.0; 3], [1.0; 3]);

        assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
        assert_eq!(tensor[[0, 0, 0, 1]], 1.0);
        assert!((tensor[[0, 2, 0, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }
}
