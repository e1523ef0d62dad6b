//! NIQE (Natural Image Quality Evaluator), a no-reference quality score.
//!
//! NIQE fits a multivariate Gaussian to the patch features of a frame and
//! measures its distance to a "pristine" Gaussian fitted on natural,
//! undistorted images. Lower scores look more natural.
//!
//! The pristine model is data: load one with [`NiqeModel::load`] or fit one
//! from clean images with [`NiqeFitter`].
//!
//! # Example
//!
//! ```rust,ignore
//! use restore_eval::metrics::niqe::{NiqeFitter, NiqeModel};
//!
//! let mut fitter = NiqeFitter::new(NiqeModel::DEFAULT_PATCH_SIZE);
//! for gray in clean_frames {
//!     fitter.add_image(&gray)?;
//! }
//! let model = fitter.finish()?;
//! let score = model.score(&distorted_gray)?;
//! ```

mod features;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use imgref::ImgVec;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};

pub use features::FEATURE_DIM;

/// Singular values below this are dropped by the pseudo-inverse.
const PINV_EPS: f64 = 1e-12;

/// Patches sharper than this fraction of the sharpest patch are used for fitting.
const SHARPNESS_FRACTION: f64 = 0.75;

/// Why a NIQE score could not be computed for one image.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum NiqeError {
    /// The frame is too small for the model's patch size.
    #[error("frame {width}x{height} too small, NIQE needs more than {min}x{min}")]
    FrameTooSmall {
        /// Frame width.
        width: usize,
        /// Frame height.
        height: usize,
        /// Minimum side length (exclusive).
        min: usize,
    },

    /// Fewer than two patches had usable statistics.
    #[error("not enough usable patches ({usable}) to fit feature statistics")]
    NoUsablePatches {
        /// Number of usable patches found.
        usable: usize,
    },

    /// Some patches have degenerate statistics (e.g. flat regions), which
    /// leaves the frame's feature covariance undefined.
    #[error("{degenerate} of {total} patches have degenerate statistics")]
    DegeneratePatches {
        /// Number of degenerate patches.
        degenerate: usize,
        /// Number of patches in the frame.
        total: usize,
    },

    /// The computed distance was NaN or infinite.
    #[error("NIQE distance is not finite")]
    NonFinite,

    /// The pooled covariance could not be pseudo-inverted.
    #[error("covariance pseudo-inverse failed: {0}")]
    SingularCovariance(String),

    /// No pristine model is available to compare against.
    #[error("no pristine NIQE model available")]
    MissingModel,
}

/// A no-reference quality estimator over unit-range grayscale frames.
pub trait QualityEstimator: Send + Sync {
    /// Short metric name for logs and reports.
    fn name(&self) -> &str;

    /// Score one frame.
    fn score(&self, gray: &ImgVec<f64>) -> std::result::Result<f64, NiqeError>;
}

/// Pristine multivariate Gaussian of natural-image patch features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NiqeModel {
    /// Patch side length at full scale.
    pub patch_size: usize,
    /// Feature mean, `FEATURE_DIM` entries.
    pub mean: Vec<f64>,
    /// Feature covariance, `FEATURE_DIM × FEATURE_DIM` row-major.
    pub covariance: Vec<f64>,
}

impl NiqeModel {
    /// Patch size of the classic NIQE model.
    pub const DEFAULT_PATCH_SIZE: usize = 96;

    /// Load a model from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// model has the wrong shape.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let model: Self = serde_json::from_reader(BufReader::new(file))?;
        model.validate()?;
        Ok(model)
    }

    /// Save the model as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.patch_size < 8 || self.patch_size % 2 != 0 {
            return Err(Error::NiqeModel(format!(
                "patch size must be even and at least 8, got {}",
                self.patch_size
            )));
        }
        if self.mean.len() != FEATURE_DIM || self.covariance.len() != FEATURE_DIM * FEATURE_DIM {
            return Err(Error::NiqeModel(format!(
                "expected {FEATURE_DIM} means and {} covariance entries, got {} and {}",
                FEATURE_DIM * FEATURE_DIM,
                self.mean.len(),
                self.covariance.len()
            )));
        }
        if !self.mean.iter().chain(&self.covariance).all(|v| v.is_finite()) {
            return Err(Error::NiqeModel("model contains non-finite values".to_string()));
        }
        Ok(())
    }

    /// NIQE score of a unit-range grayscale frame.
    ///
    /// Every patch must have usable statistics: a single flat patch (for
    /// example a letterbox border) fails the whole frame.
    pub fn score(&self, gray: &ImgVec<f64>) -> std::result::Result<f64, NiqeError> {
        check_frame(gray, self.patch_size)?;

        let patches = features::extract(gray, self.patch_size);
        let total = patches.len();
        let feats: Vec<[f64; FEATURE_DIM]> = patches.into_iter().flatten().map(|p| p.values).collect();
        if feats.len() < total {
            return Err(NiqeError::DegeneratePatches {
                degenerate: total - feats.len(),
                total,
            });
        }

        let (mean, covariance) = gaussian_fit(&feats);

        let diff = DVector::from_iterator(FEATURE_DIM, self.mean.iter().zip(&mean).map(|(p, d)| p - d));
        // Both covariances are symmetric, so column-major filling is harmless.
        let pooled = DMatrix::from_iterator(
            FEATURE_DIM,
            FEATURE_DIM,
            self.covariance.iter().zip(&covariance).map(|(p, d)| (p + d) / 2.0),
        );

        let pinv = pooled
            .pseudo_inverse(PINV_EPS)
            .map_err(|e| NiqeError::SingularCovariance(e.to_string()))?;

        let distance_sq = diff.dot(&(&pinv * &diff));
        if !distance_sq.is_finite() {
            return Err(NiqeError::NonFinite);
        }

        Ok(distance_sq.max(0.0).sqrt())
    }
}

fn check_frame(gray: &ImgVec<f64>, patch_size: usize) -> std::result::Result<(), NiqeError> {
    let min = 2 * patch_size + 1;
    if gray.width() <= min || gray.height() <= min {
        return Err(NiqeError::FrameTooSmall {
            width: gray.width(),
            height: gray.height(),
            min,
        });
    }
    Ok(())
}

/// Mean and sample covariance (N-1 denominator, row-major) of feature vectors.
fn gaussian_fit(feats: &[[f64; FEATURE_DIM]]) -> (Vec<f64>, Vec<f64>) {
    let n = feats.len() as f64;

    let mut mean = vec![0.0; FEATURE_DIM];
    for f in feats {
        for (m, v) in mean.iter_mut().zip(f) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let mut covariance = vec![0.0; FEATURE_DIM * FEATURE_DIM];
    for f in feats {
        for i in 0..FEATURE_DIM {
            let di = f[i] - mean[i];
            for j in i..FEATURE_DIM {
                covariance[i * FEATURE_DIM + j] += di * (f[j] - mean[j]);
            }
        }
    }
    for i in 0..FEATURE_DIM {
        for j in i..FEATURE_DIM {
            let c = covariance[i * FEATURE_DIM + j] / (n - 1.0);
            covariance[i * FEATURE_DIM + j] = c;
            covariance[j * FEATURE_DIM + i] = c;
        }
    }

    (mean, covariance)
}

/// Accumulates sharp patches from clean frames into a pristine model.
#[derive(Debug, Clone)]
pub struct NiqeFitter {
    patch_size: usize,
    features: Vec<[f64; FEATURE_DIM]>,
}

impl NiqeFitter {
    /// Create a fitter for the given patch size (even, at least 8).
    #[must_use]
    pub fn new(patch_size: usize) -> Self {
        Self {
            patch_size,
            features: Vec::new(),
        }
    }

    /// Number of patch feature vectors collected so far.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.features.len()
    }

    /// Add the sharp patches of one clean frame. Returns how many were kept.
    ///
    /// Patches with degenerate statistics are skipped rather than failing the frame.
    pub fn add_image(&mut self, gray: &ImgVec<f64>) -> std::result::Result<usize, NiqeError> {
        check_frame(gray, self.patch_size)?;

        let patches: Vec<_> = features::extract(gray, self.patch_size).into_iter().flatten().collect();
        let max_sharpness = patches.iter().map(|p| p.sharpness).fold(0.0, f64::max);
        if patches.is_empty() || max_sharpness <= 0.0 {
            return Err(NiqeError::NoUsablePatches { usable: 0 });
        }

        let threshold = SHARPNESS_FRACTION * max_sharpness;
        let before = self.features.len();
        self.features.extend(
            patches
                .iter()
                .filter(|p| p.sharpness > threshold)
                .map(|p| p.values),
        );
        Ok(self.features.len() - before)
    }

    /// Fit the pristine Gaussian over every collected patch.
    pub fn finish(self) -> std::result::Result<NiqeModel, NiqeError> {
        if self.features.len() < 2 {
            return Err(NiqeError::NoUsablePatches { usable: self.features.len() });
        }

        let (mean, covariance) = gaussian_fit(&self.features);
        if !mean.iter().chain(&covariance).all(|v| v.is_finite()) {
            return Err(NiqeError::NonFinite);
        }

        Ok(NiqeModel {
            patch_size: self.patch_size,
            mean,
            covariance,
        })
    }
}

/// NIQE estimator backed by an optional pristine model.
///
/// Without a model every call fails with [`NiqeError::MissingModel`].
#[derive(Debug, Clone, Default)]
pub struct Niqe {
    model: Option<NiqeModel>,
}

impl Niqe {
    /// Estimator using `model`.
    #[must_use]
    pub fn new(model: NiqeModel) -> Self {
        Self { model: Some(model) }
    }

    /// Estimator with no model; every score is an error.
    #[must_use]
    pub fn without_model() -> Self {
        Self { model: None }
    }
}

impl QualityEstimator for Niqe {
    fn name(&self) -> &str {
        "NIQE"
    }

    fn score(&self, gray: &ImgVec<f64>) -> std::result::Result<f64, NiqeError> {
        self.model.as_ref().ok_or(NiqeError::MissingModel)?.score(gray)
    }
}
