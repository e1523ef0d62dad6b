//! Error types for restore-eval operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for restore-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an evaluation run.
///
/// Missing ground-truth files and NIQE failures are not represented here:
/// both are recovered inside the run and surface as events instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to load an image file.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Image dimensions don't match between reference and test images.
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height).
        expected: (usize, usize),
        /// Actual dimensions (width, height).
        actual: (usize, usize),
    },

    /// Failed to calculate a quality metric.
    #[error("Metric calculation failed: {metric}: {reason}")]
    MetricCalculation {
        /// Name of the metric that failed.
        metric: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to list an input directory.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// A NIQE model file could not be used.
    #[error("NIQE model error: {0}")]
    NiqeModel(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
