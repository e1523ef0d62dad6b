//! Quality metrics for image comparison.
//!
//! Full-reference metrics compare a ground-truth image with a model output:
//!
//! - **PSNR**: Peak Signal-to-Noise Ratio in dB (higher is better)
//! - **SSIM**: Structural similarity (1.0 = identical)
//! - **DSSIM**: Structural dissimilarity (0 = identical, `dssim` feature)
//!
//! The no-reference **NIQE** score is computed for each image on its own
//! (lower means more natural-looking).

#[cfg(feature = "dssim")]
pub mod dssim;
pub mod niqe;
pub mod ssim;

use imgref::ImgRef;
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// PSNR reported for two identical images.
///
/// A perfect match has infinite PSNR; it is reported as 100 dB instead.
pub const PSNR_PERFECT_MATCH: f64 = 100.0;

/// Configuration for which metrics to calculate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Calculate PSNR (peak signal-to-noise ratio).
    pub psnr: bool,
    /// Calculate SSIM (structural similarity).
    pub ssim: bool,
    /// Calculate NIQE for both images of a pair.
    pub niqe: bool,
    /// Calculate DSSIM (requires the `dssim` feature).
    pub dssim: bool,
}

impl MetricConfig {
    /// PSNR, SSIM and NIQE.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            psnr: true,
            ssim: true,
            niqe: true,
            dssim: false,
        }
    }

    /// Calculate all available metrics.
    #[must_use]
    pub fn all() -> Self {
        Self {
            dssim: cfg!(feature = "dssim"),
            ..Self::standard()
        }
    }

    /// Fast metric set (full-reference only).
    #[must_use]
    pub fn fast() -> Self {
        Self {
            psnr: true,
            ssim: true,
            niqe: false,
            dssim: false,
        }
    }
}

/// Metric values for one image pair.
///
/// `None` means the metric was not requested. A NIQE value of NaN means the
/// estimator failed on that image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricResult {
    /// PSNR value in dB (higher is better).
    pub psnr: Option<f64>,
    /// SSIM value (1.0 = identical).
    pub ssim: Option<f64>,
    /// NIQE of the ground-truth image.
    pub gt_niqe: Option<f64>,
    /// NIQE of the model output.
    pub output_niqe: Option<f64>,
    /// DSSIM value (lower is better, 0 = identical).
    pub dssim: Option<f64>,
}

/// Fail with [`Error::DimensionMismatch`] unless both images have the same size.
pub(crate) fn check_dimensions(reference: ImgRef<'_, RGB8>, test: ImgRef<'_, RGB8>) -> Result<()> {
    if reference.width() != test.width() || reference.height() != test.height() {
        return Err(Error::DimensionMismatch {
            expected: (reference.width(), reference.height()),
            actual: (test.width(), test.height()),
        });
    }
    Ok(())
}

/// Calculate PSNR between two RGB8 images.
///
/// Uses a peak value of 255 over every channel sample. Returns
/// [`PSNR_PERFECT_MATCH`] if the images are identical.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if the images differ in size.
pub fn calculate_psnr(reference: ImgRef<'_, RGB8>, test: ImgRef<'_, RGB8>) -> Result<f64> {
    check_dimensions(reference, test)?;

    let mut mse_sum: f64 = 0.0;
    for (r, t) in reference.pixels().zip(test.pixels()) {
        for (a, b) in [(r.r, t.r), (r.g, t.g), (r.b, t.b)] {
            let diff = f64::from(a) - f64::from(b);
            mse_sum += diff * diff;
        }
    }

    let sample_count = (reference.width() * reference.height() * 3) as f64;
    let mse = mse_sum / sample_count;

    if mse == 0.0 {
        Ok(PSNR_PERFECT_MATCH)
    } else {
        Ok(20.0 * (255.0 / mse.sqrt()).log10())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;

    fn solid(value: u8, width: usize, height: usize) -> ImgVec<RGB8> {
        ImgVec::new(vec![RGB8::new(value, value, value); width * height], width, height)
    }

    #[test]
    fn test_psnr_identical() {
        let img = solid(128, 100, 100);
        let psnr = calculate_psnr(img.as_ref(), img.as_ref()).unwrap();
        assert_eq!(psnr, PSNR_PERFECT_MATCH);
    }

    #[test]
    fn test_psnr_different() {
        let reference = solid(100, 100, 100);
        let test = solid(110, 100, 100);
        let psnr = calculate_psnr(reference.as_ref(), test.as_ref()).unwrap();
        // Constant difference of 10: 20 * log10(255 / 10) ≈ 28.13
        assert!(psnr > 28.0);
        assert!(psnr < 29.0);
    }

    #[test]
    fn test_psnr_symmetric() {
        let a = ImgVec::new(
            (0..64u32).map(|i| RGB8::new(i as u8, (i * 3) as u8, 200)).collect(),
            8,
            8,
        );
        let b = solid(40, 8, 8);
        let ab = calculate_psnr(a.as_ref(), b.as_ref()).unwrap();
        let ba = calculate_psnr(b.as_ref(), a.as_ref()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_psnr_black_white() {
        let black = solid(0, 16, 16);
        let white = solid(255, 16, 16);
        let psnr = calculate_psnr(black.as_ref(), white.as_ref()).unwrap();
        assert!(psnr.abs() < 1e-9);
    }

    #[test]
    fn test_psnr_no_wraparound() {
        // 10 - 250 must count as a difference of 240, not 16.
        let a = solid(10, 4, 4);
        let b = solid(250, 4, 4);
        let psnr = calculate_psnr(a.as_ref(), b.as_ref()).unwrap();
        let expected = 20.0 * (255.0_f64 / 240.0).log10();
        assert!((psnr - expected).abs() < 1e-9);
    }

    #[test]
    fn test_psnr_dimension_mismatch() {
        let small = solid(0, 4, 4);
        let large = solid(0, 8, 4);
        let result = calculate_psnr(small.as_ref(), large.as_ref());
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_metric_config_presets() {
        let config = MetricConfig::standard();
        assert!(config.psnr && config.ssim && config.niqe);
        assert!(!config.dssim);

        let fast = MetricConfig::fast();
        assert!(fast.psnr && fast.ssim);
        assert!(!fast.niqe);

        assert_eq!(MetricConfig::all().dssim, cfg!(feature = "dssim"));
    }
}
