//! # restore-eval
//!
//! Paired evaluation of image-restoration outputs against ground truth.
//!
//! A model writes its restored images into one folder (`x_rain.png`), the
//! clean references live in another (`x_clean.png`). This library pairs the
//! two, computes full-reference metrics (PSNR, SSIM, optionally DSSIM) and
//! the no-reference NIQE score for both sides, and aggregates the results
//! over the dataset.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restore_eval::{EvalConfig, EvalSession, PairEvent};
//!
//! let config = EvalConfig::builder()
//!     .output_dir("./results")
//!     .gt_dir("./test_a/gt")
//!     .build();
//!
//! let session = EvalSession::new(config);
//! let report = session.run(|event| {
//!     if let PairEvent::Evaluated(pair) = event {
//!         println!("{}: {:?}", pair.name, pair.metrics.psnr);
//!     }
//! })?;
//!
//! println!("Average PSNR: {} dB", report.summary.psnr);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`decode`]: Image loading and pixel conversions
//! - [`pairing`]: Output → ground-truth filename rules and discovery
//! - [`metrics`]: PSNR, SSIM, NIQE (and DSSIM)
//! - [`eval`]: Evaluation session and reports
//! - [`stats`]: Aggregation helpers

pub mod decode;
pub mod error;
pub mod eval;
pub mod metrics;
pub mod pairing;
pub mod stats;

// Re-export commonly used types
pub use error::{Error, Result};
pub use eval::{
    report::{DatasetReport, DatasetSummary, PairReport},
    session::{EvalConfig, EvalSession, ImageSide, PairEvent},
};
pub use metrics::niqe::{Niqe, NiqeError, NiqeFitter, NiqeModel, QualityEstimator};
pub use metrics::{MetricConfig, MetricResult, PSNR_PERFECT_MATCH};
pub use pairing::{PairCandidate, PairingRule, SuffixPairing};
pub use stats::Summary;
