//! Evaluation session and report generation.
//!
//! - [`session::EvalSession`]: Pairs discovery, per-pair metrics, events
//! - [`session::EvalConfig`]: Configuration for evaluation
//! - [`report`]: Report types for evaluation results

pub mod report;
pub mod session;

pub use report::{DatasetReport, DatasetSummary, PairReport};
pub use session::{EvalConfig, EvalSession, ImageSide, PairEvent};
