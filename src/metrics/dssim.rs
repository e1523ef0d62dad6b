//! DSSIM (Structural Dissimilarity) metric calculation.
//!
//! Wraps the `dssim-core` crate. Inputs are sRGB8 and are linearized before
//! comparison, which is what dssim-core expects for float pixels.

use dssim_core::Dssim;
use imgref::{ImgRef, ImgVec};
use rgb::{RGB8, RGBA};

use super::check_dimensions;
use crate::error::{Error, Result};

/// Apply sRGB gamma decoding (sRGB u8 → linear f32).
#[inline]
fn srgb_to_linear(srgb: u8) -> f32 {
    let s = f32::from(srgb) / 255.0;
    if s <= 0.04045 {
        s / 12.92
    } else {
        ((s + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert an RGB8 image to opaque linear-light RGBA floats.
#[must_use]
pub fn rgb8_to_linear_rgba(img: ImgRef<'_, RGB8>) -> ImgVec<RGBA<f32>> {
    let pixels: Vec<RGBA<f32>> = img
        .pixels()
        .map(|p| RGBA::new(srgb_to_linear(p.r), srgb_to_linear(p.g), srgb_to_linear(p.b), 1.0))
        .collect();
    ImgVec::new(pixels, img.width(), img.height())
}

/// Calculate DSSIM between two RGB8 images.
///
/// # Returns
///
/// DSSIM value where 0 = identical, higher = more different.
///
/// # Errors
///
/// Returns an error if the images have different dimensions or if dssim-core
/// rejects them (e.g. too small to analyze).
pub fn calculate_dssim(reference: ImgRef<'_, RGB8>, test: ImgRef<'_, RGB8>) -> Result<f64> {
    check_dimensions(reference, test)?;

    let dssim = Dssim::new();

    let ref_image = dssim
        .create_image(&rgb8_to_linear_rgba(reference))
        .ok_or_else(|| Error::MetricCalculation {
            metric: "DSSIM".to_string(),
            reason: "Failed to create reference image".to_string(),
        })?;

    let test_image = dssim
        .create_image(&rgb8_to_linear_rgba(test))
        .ok_or_else(|| Error::MetricCalculation {
            metric: "DSSIM".to_string(),
            reason: "Failed to create test image".to_string(),
        })?;

    let (dssim_val, _ssim_maps) = dssim.compare(&ref_image, test_image);

    Ok(f64::from(dssim_val))
}
