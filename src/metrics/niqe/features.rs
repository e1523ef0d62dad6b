//! Natural-scene-statistics features for NIQE.
//!
//! A frame is described at two scales. At each scale the MSCN
//! (mean-subtracted contrast-normalized) coefficients are cut into
//! non-overlapping patches, and each patch yields 18 features from
//! asymmetric generalized Gaussian (AGGD) fits.

use std::sync::OnceLock;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use imgref::ImgVec;
use rayon::prelude::*;
use statrs::function::gamma::gamma;

/// Features extracted per patch at one scale.
pub const FEATURES_PER_SCALE: usize = 18;

/// Length of a full patch feature vector (two scales).
pub const FEATURE_DIM: usize = 2 * FEATURES_PER_SCALE;

const GAUSS_HALF_WIDTH: usize = 3;
const GAUSS_SIGMA: f64 = 7.0 / 6.0;
/// Stabilizes the contrast normalization on the 0-255 scale.
const MSCN_C: f64 = 1.0;

const SHAPE_MIN: f64 = 0.2;
const SHAPE_STEP: f64 = 0.001;
const SHAPE_COUNT: usize = 9800;

/// Feature vector and sharpness of one patch.
#[derive(Debug, Clone)]
pub(crate) struct PatchFeatures {
    pub values: [f64; FEATURE_DIM],
    /// Mean local deviation of the patch at full scale.
    pub sharpness: f64,
}

/// MSCN coefficients and the local deviation used to normalize them.
struct Mscn {
    coefficients: ImgVec<f64>,
    sigma: ImgVec<f64>,
}

/// Normalized 7-tap Gaussian window.
fn gaussian_window() -> [f64; 2 * GAUSS_HALF_WIDTH + 1] {
    let mut weights = [0.0; 2 * GAUSS_HALF_WIDTH + 1];
    let variance = GAUSS_SIGMA * GAUSS_SIGMA;
    weights[GAUSS_HALF_WIDTH] = 1.0;
    let mut sum = 1.0;
    for i in 1..=GAUSS_HALF_WIDTH {
        let w = (-0.5 * (i * i) as f64 / variance).exp();
        weights[GAUSS_HALF_WIDTH + i] = w;
        weights[GAUSS_HALF_WIDTH - i] = w;
        sum += 2.0 * w;
    }
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Separable correlation with zero extension outside the frame.
fn smooth(plane: &ImgVec<f64>, weights: &[f64]) -> ImgVec<f64> {
    let (width, height) = (plane.width(), plane.height());
    let src = plane.buf();
    let half = weights.len() / 2;

    let mut rows = vec![0.0; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in weights.iter().enumerate() {
                let sx = (x + k).wrapping_sub(half);
                if sx < width {
                    acc += w * src[y * width + sx];
                }
            }
            rows[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0; width * height];
    for y in 0..height {
        for (k, w) in weights.iter().enumerate() {
            let sy = (y + k).wrapping_sub(half);
            if sy >= height {
                continue;
            }
            for x in 0..width {
                out[y * width + x] += w * rows[sy * width + x];
            }
        }
    }

    ImgVec::new(out, width, height)
}

fn mscn(plane: &ImgVec<f64>) -> Mscn {
    let weights = gaussian_window();
    let mu = smooth(plane, &weights);
    let squared = ImgVec::new(plane.buf().iter().map(|v| v * v).collect(), plane.width(), plane.height());
    let mu_sq = smooth(&squared, &weights);

    let sigma: Vec<f64> = mu
        .buf()
        .iter()
        .zip(mu_sq.buf())
        .map(|(m, m2)| (m2 - m * m).abs().sqrt())
        .collect();

    let coefficients: Vec<f64> = plane
        .buf()
        .iter()
        .zip(mu.buf())
        .zip(&sigma)
        .map(|((v, m), s)| (v - m) / (s + MSCN_C))
        .collect();

    Mscn {
        coefficients: ImgVec::new(coefficients, plane.width(), plane.height()),
        sigma: ImgVec::new(sigma, plane.width(), plane.height()),
    }
}

/// Top-left `width × height` region of a plane.
fn crop(plane: &ImgVec<f64>, width: usize, height: usize) -> ImgVec<f64> {
    let pixels = plane
        .rows()
        .take(height)
        .flat_map(|row| row[..width].iter().copied())
        .collect();
    ImgVec::new(pixels, width, height)
}

/// Bicubic half-scale copy. Input values must lie in 0.0-1.0.
fn half_scale(plane: &ImgVec<f64>) -> ImgVec<f64> {
    let (width, height) = (plane.width() as u32, plane.height() as u32);
    let buf: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([plane[(x as usize, y as usize)] as f32]));

    let small = imageops::resize(&buf, width / 2, height / 2, FilterType::CatmullRom);
    let pixels = small.pixels().map(|p| f64::from(p[0])).collect();
    ImgVec::new(pixels, (width / 2) as usize, (height / 2) as usize)
}

fn to_8bit_scale(plane: &ImgVec<f64>) -> ImgVec<f64> {
    ImgVec::new(plane.buf().iter().map(|v| v * 255.0).collect(), plane.width(), plane.height())
}

/// `(shape, rho(shape))` lookup for AGGD moment matching.
fn shape_table() -> &'static [(f64, f64)] {
    static TABLE: OnceLock<Vec<(f64, f64)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        (0..SHAPE_COUNT)
            .map(|i| {
                let alpha = SHAPE_MIN + i as f64 * SHAPE_STEP;
                let g2 = gamma(2.0 / alpha);
                let rho = g2 * g2 / (gamma(1.0 / alpha) * gamma(3.0 / alpha));
                (alpha, rho)
            })
            .collect()
    })
}

/// Parameters of an asymmetric generalized Gaussian fit.
#[derive(Debug, Clone, Copy)]
struct Aggd {
    shape: f64,
    mean: f64,
    left_scale: f64,
    right_scale: f64,
}

/// Moment-matching AGGD fit. `None` when either tail is empty.
fn fit_aggd(values: &[f64]) -> Option<Aggd> {
    let (mut left_sq, mut left_n) = (0.0, 0usize);
    let (mut right_sq, mut right_n) = (0.0, 0usize);
    let (mut abs_sum, mut sq_sum) = (0.0, 0.0);

    for &v in values {
        if v < 0.0 {
            left_sq += v * v;
            left_n += 1;
        } else if v > 0.0 {
            right_sq += v * v;
            right_n += 1;
        }
        abs_sum += v.abs();
        sq_sum += v * v;
    }

    if left_n == 0 || right_n == 0 {
        return None;
    }

    let n = values.len() as f64;
    let left_std = (left_sq / left_n as f64).sqrt();
    let right_std = (right_sq / right_n as f64).sqrt();
    let gamma_hat = left_std / right_std;
    let r_hat = (abs_sum / n).powi(2) / (sq_sum / n);
    let r_hat_norm = r_hat * (gamma_hat.powi(3) + 1.0) * (gamma_hat + 1.0) / (gamma_hat.powi(2) + 1.0).powi(2);

    let (shape, _) = shape_table().iter().copied().min_by(|a, b| {
        let da = (a.1 - r_hat_norm).powi(2);
        let db = (b.1 - r_hat_norm).powi(2);
        da.total_cmp(&db)
    })?;

    let g1 = gamma(1.0 / shape);
    let g2 = gamma(2.0 / shape);
    let g3 = gamma(3.0 / shape);
    let ratio = (g1 / g3).sqrt();
    let left_scale = ratio * left_std;
    let right_scale = ratio * right_std;

    Some(Aggd {
        shape,
        mean: (right_scale - left_scale) * (g2 / g1),
        left_scale,
        right_scale,
    })
}

/// Products of each coefficient with its horizontal, vertical and two
/// diagonal neighbours, wrapping around the patch edges.
fn paired_products(patch: &[f64], size: usize) -> [Vec<f64>; 4] {
    let mut horizontal = Vec::with_capacity(patch.len());
    let mut vertical = Vec::with_capacity(patch.len());
    let mut diag_left = Vec::with_capacity(patch.len());
    let mut diag_right = Vec::with_capacity(patch.len());

    for y in 0..size {
        let up = (y + size - 1) % size;
        for x in 0..size {
            let left = (x + size - 1) % size;
            let right = (x + 1) % size;
            let c = patch[y * size + x];
            horizontal.push(c * patch[y * size + left]);
            vertical.push(c * patch[up * size + x]);
            diag_left.push(c * patch[up * size + left]);
            diag_right.push(c * patch[up * size + right]);
        }
    }

    [horizontal, vertical, diag_left, diag_right]
}

fn patch_values(plane: &ImgVec<f64>, left: usize, top: usize, size: usize) -> Vec<f64> {
    plane
        .rows()
        .skip(top)
        .take(size)
        .flat_map(|row| row[left..left + size].iter().copied())
        .collect()
}

fn subband_features(plane: &ImgVec<f64>, left: usize, top: usize, size: usize) -> Option<[f64; FEATURES_PER_SCALE]> {
    let patch = patch_values(plane, left, top, size);
    let mut feats = [0.0; FEATURES_PER_SCALE];

    let base = fit_aggd(&patch)?;
    feats[0] = base.shape;
    feats[1] = (base.left_scale + base.right_scale) / 2.0;

    for (k, product) in paired_products(&patch, size).iter().enumerate() {
        let fit = fit_aggd(product)?;
        feats[2 + 4 * k..6 + 4 * k].copy_from_slice(&[fit.shape, fit.mean, fit.left_scale, fit.right_scale]);
    }

    Some(feats)
}

/// Extract features for every patch of a unit-range grayscale frame.
///
/// The frame is cropped to a multiple of `patch_size`. Patches are returned
/// in row-major order; `None` marks a patch whose statistics are degenerate
/// (for example a perfectly flat region).
pub(crate) fn extract(gray: &ImgVec<f64>, patch_size: usize) -> Vec<Option<PatchFeatures>> {
    let cols = gray.width() / patch_size;
    let rows = gray.height() / patch_size;
    let half_patch = patch_size / 2;

    let cropped = crop(gray, cols * patch_size, rows * patch_size);
    let fine = mscn(&to_8bit_scale(&cropped));
    let coarse = mscn(&to_8bit_scale(&half_scale(&cropped)));

    (0..rows * cols)
        .into_par_iter()
        .map(|idx| {
            let (px, py) = (idx % cols, idx / cols);
            let lvl1 = subband_features(&fine.coefficients, px * patch_size, py * patch_size, patch_size)?;
            let lvl2 = subband_features(&coarse.coefficients, px * half_patch, py * half_patch, half_patch)?;

            let sigma = patch_values(&fine.sigma, px * patch_size, py * patch_size, patch_size);
            let sharpness = sigma.iter().sum::<f64>() / sigma.len() as f64;

            let mut values = [0.0; FEATURE_DIM];
            values[..FEATURES_PER_SCALE].copy_from_slice(&lvl1);
            values[FEATURES_PER_SCALE..].copy_from_slice(&lvl2);

            if values.iter().all(|v| v.is_finite()) {
                Some(PatchFeatures { values, sharpness })
            } else {
                None
            }
        })
        .collect()
}
