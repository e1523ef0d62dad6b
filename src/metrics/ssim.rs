//! SSIM (Structural Similarity) metric calculation.
//!
//! Mean SSIM with the classic scikit-image defaults: a 7×7 uniform window,
//! `K1 = 0.01`, `K2 = 0.03`, sample covariance, and a data range of 2.0 on
//! unit-scaled channels (the full range of the float dtype, -1 to 1). The
//! SSIM map is averaged over the pixels whose window lies fully inside the
//! image, then the per-channel means are averaged.

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

use super::check_dimensions;
use crate::decode::to_unit_planes;
use crate::error::{Error, Result};

/// Side length of the square SSIM window.
pub const WINDOW_SIZE: usize = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
/// Dynamic range assumed for unit-scaled float channels.
pub const DATA_RANGE: f64 = 2.0;

/// Summed-area table over `(width + 1) × (height + 1)` entries.
struct Integral {
    stride: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn new(width: usize, height: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0.0;
            for x in 0..width {
                row_sum += value(y * width + x);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the `size × size` block with top-left corner `(x, y)`.
    #[inline]
    fn block(&self, x: usize, y: usize, size: usize) -> f64 {
        let s = self.stride;
        let (x1, y1) = (x + size, y + size);
        self.sums[y1 * s + x1] - self.sums[y * s + x1] - self.sums[y1 * s + x] + self.sums[y * s + x]
    }
}

/// Mean SSIM of two single-channel planes of equal size.
fn plane_ssim(x: &ImgVec<f64>, y: &ImgVec<f64>) -> f64 {
    let (width, height) = (x.width(), x.height());
    let xs = x.buf();
    let ys = y.buf();

    let sum_x = Integral::new(width, height, |i| xs[i]);
    let sum_y = Integral::new(width, height, |i| ys[i]);
    let sum_xx = Integral::new(width, height, |i| xs[i] * xs[i]);
    let sum_yy = Integral::new(width, height, |i| ys[i] * ys[i]);
    let sum_xy = Integral::new(width, height, |i| xs[i] * ys[i]);

    let np = (WINDOW_SIZE * WINDOW_SIZE) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for top in 0..=height - WINDOW_SIZE {
        for left in 0..=width - WINDOW_SIZE {
            let ux = sum_x.block(left, top, WINDOW_SIZE) / np;
            let uy = sum_y.block(left, top, WINDOW_SIZE) / np;
            let uxx = sum_xx.block(left, top, WINDOW_SIZE) / np;
            let uyy = sum_yy.block(left, top, WINDOW_SIZE) / np;
            let uxy = sum_xy.block(left, top, WINDOW_SIZE) / np;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    total / count as f64
}

/// Calculate mean SSIM between two RGB8 images.
///
/// # Returns
///
/// SSIM in `[-1, 1]`, where 1.0 means identical.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if the images differ in size and
/// [`Error::MetricCalculation`] if either side is smaller than the window.
pub fn calculate_ssim(reference: ImgRef<'_, RGB8>, test: ImgRef<'_, RGB8>) -> Result<f64> {
    check_dimensions(reference, test)?;

    if reference.width() < WINDOW_SIZE || reference.height() < WINDOW_SIZE {
        return Err(Error::MetricCalculation {
            metric: "SSIM".to_string(),
            reason: format!(
                "image {}x{} is smaller than the {WINDOW_SIZE}x{WINDOW_SIZE} window",
                reference.width(),
                reference.height()
            ),
        });
    }

    let ref_planes = to_unit_planes(reference);
    let test_planes = to_unit_planes(test);

    let sum: f64 = ref_planes
        .iter()
        .zip(test_planes.iter())
        .map(|(x, y)| plane_ssim(x, y))
        .sum();

    Ok(sum / ref_planes.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> ImgVec<RGB8> {
        let pixels = (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                RGB8::new((x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x * y) % 256) as u8)
            })
            .collect();
        ImgVec::new(pixels, width, height)
    }

    #[test]
    fn test_identical_images() {
        let img = gradient(32, 24);
        let ssim = calculate_ssim(img.as_ref(), img.as_ref()).unwrap();
        assert!((ssim - 1.0).abs() < 1e-9, "got {ssim}");
    }

    #[test]
    fn test_black_white() {
        let black = ImgVec::new(vec![RGB8::new(0, 0, 0); 16 * 16], 16, 16);
        let white = ImgVec::new(vec![RGB8::new(255, 255, 255); 16 * 16], 16, 16);
        let ssim = calculate_ssim(black.as_ref(), white.as_ref()).unwrap();
        assert!(ssim < 0.01, "got {ssim}");
    }

    #[test]
    fn test_constants_use_float_range() {
        // Flat black against flat white leaves only the C1 term:
        // C1 / (1 + C1) with C1 = (0.01 * 2.0)^2.
        let black = ImgVec::new(vec![RGB8::new(0, 0, 0); 8 * 8], 8, 8);
        let white = ImgVec::new(vec![RGB8::new(255, 255, 255); 8 * 8], 8, 8);
        let ssim = calculate_ssim(black.as_ref(), white.as_ref()).unwrap();
        let c1 = 0.0004;
        assert!((ssim - c1 / (1.0 + c1)).abs() < 1e-12, "got {ssim}");
    }

    #[test]
    fn test_noise_lowers_ssim() {
        let reference = gradient(32, 32);
        let noisy: Vec<RGB8> = reference
            .pixels()
            .enumerate()
            .map(|(i, p)| {
                let n = if i % 2 == 0 { 40 } else { 0 };
                RGB8::new(p.r.saturating_add(n), p.g.saturating_sub(n), p.b)
            })
            .collect();
        let noisy = ImgVec::new(noisy, 32, 32);

        let ssim = calculate_ssim(reference.as_ref(), noisy.as_ref()).unwrap();
        assert!(ssim < 0.99);
        assert!(ssim > 0.0);
    }

    #[test]
    fn test_symmetric() {
        let a = gradient(20, 20);
        let b = ImgVec::new(vec![RGB8::new(90, 90, 90); 400], 20, 20);
        let ab = calculate_ssim(a.as_ref(), b.as_ref()).unwrap();
        let ba = calculate_ssim(b.as_ref(), a.as_ref()).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_too_small() {
        let img = gradient(6, 10);
        let result = calculate_ssim(img.as_ref(), img.as_ref());
        assert!(matches!(result, Err(Error::MetricCalculation { .. })));
    }

    #[test]
    fn test_integral_block() {
        let integral = Integral::new(3, 3, |i| i as f64);
        // 0 1 2 / 3 4 5 / 6 7 8
        assert_eq!(integral.block(0, 0, 3), 36.0);
        assert_eq!(integral.block(1, 1, 2), 4.0 + 5.0 + 7.0 + 8.0);
    }
}
