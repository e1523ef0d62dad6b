//! Evaluation session over an output folder and a ground-truth folder.
//!
//! This module provides [`EvalSession`], the main entry point. The session
//! discovers pairs, computes metrics one pair at a time in sorted order, and
//! reports progress through [`PairEvent`] callbacks so the caller can print
//! results as they are produced.

use std::path::{Path, PathBuf};

use imgref::ImgVec;
use rgb::RGB8;

use crate::decode::{load_rgb8, to_gray_unit};
use crate::error::Result;
use crate::eval::report::{DatasetReport, PairReport};
use crate::metrics::niqe::{Niqe, NiqeError, NiqeFitter, NiqeModel, QualityEstimator};
use crate::metrics::ssim::calculate_ssim;
use crate::metrics::{calculate_psnr, MetricConfig, MetricResult};
use crate::pairing::{discover_pairs, PairCandidate, PairingRule, SuffixPairing};

/// Which image of a pair an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSide {
    /// The ground-truth image.
    GroundTruth,
    /// The model output.
    Output,
}

/// Progress notifications emitted during [`EvalSession::run`].
#[derive(Debug)]
pub enum PairEvent<'a> {
    /// A pair was evaluated.
    Evaluated(&'a PairReport),

    /// An output had no ground truth and was skipped.
    MissingGroundTruth {
        /// Output filename.
        name: &'a str,
        /// Where the ground truth was expected.
        gt_path: &'a Path,
    },

    /// The no-reference estimator failed; both NIQE values of the pair were
    /// recorded as NaN.
    EstimatorFailed {
        /// Output filename of the pair.
        name: &'a str,
        /// Image the estimator failed on.
        side: ImageSide,
        /// Failure reason.
        error: &'a NiqeError,
    },
}

/// Configuration for an evaluation session.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Folder of model outputs.
    pub output_dir: PathBuf,

    /// Folder of ground-truth images.
    pub gt_dir: PathBuf,

    /// Output → ground-truth naming convention.
    pub pairing: SuffixPairing,

    /// Which metrics to calculate.
    pub metrics: MetricConfig,
}

impl EvalConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder::default()
    }
}

/// Builder for [`EvalConfig`].
#[derive(Debug, Default)]
pub struct EvalConfigBuilder {
    output_dir: Option<PathBuf>,
    gt_dir: Option<PathBuf>,
    pairing: Option<SuffixPairing>,
    metrics: Option<MetricConfig>,
}

impl EvalConfigBuilder {
    /// Set the output folder.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the ground-truth folder.
    #[must_use]
    pub fn gt_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.gt_dir = Some(path.into());
        self
    }

    /// Set the naming convention.
    #[must_use]
    pub fn pairing(mut self, pairing: SuffixPairing) -> Self {
        self.pairing = Some(pairing);
        self
    }

    /// Set which metrics to calculate.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the configuration.
    ///
    /// # Panics
    ///
    /// Panics if `output_dir` or `gt_dir` is not set.
    #[must_use]
    pub fn build(self) -> EvalConfig {
        EvalConfig {
            output_dir: self.output_dir.expect("output_dir is required"),
            gt_dir: self.gt_dir.expect("gt_dir is required"),
            pairing: self.pairing.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_else(MetricConfig::standard),
        }
    }
}

/// Evaluation session for one output/ground-truth folder pair.
///
/// # Example
///
/// ```rust,ignore
/// use restore_eval::{EvalConfig, EvalSession, Niqe, NiqeModel};
///
/// let config = EvalConfig::builder()
///     .output_dir("./results")
///     .gt_dir("./gt")
///     .build();
///
/// let model = NiqeModel::load("niqe.json".as_ref())?;
/// let session = EvalSession::new(config).with_estimator(Box::new(Niqe::new(model)));
/// let report = session.run(|_| {})?;
/// ```
pub struct EvalSession {
    config: EvalConfig,
    rule: Box<dyn PairingRule>,
    estimator: Box<dyn QualityEstimator>,
}

impl EvalSession {
    /// Create a session using the configured naming convention and a NIQE
    /// estimator without a model.
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        let rule = Box::new(config.pairing.clone());
        Self {
            config,
            rule,
            estimator: Box::new(Niqe::without_model()),
        }
    }

    /// Replace the pairing rule.
    #[must_use]
    pub fn with_pairing_rule(mut self, rule: Box<dyn PairingRule>) -> Self {
        self.rule = rule;
        self
    }

    /// Replace the no-reference estimator.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Box<dyn QualityEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// List the output folder and pair each output with its ground truth.
    pub fn discover(&self) -> Result<Vec<PairCandidate>> {
        discover_pairs(&self.config.output_dir, &self.config.gt_dir, self.rule.as_ref())
    }

    /// Fit a pristine NIQE model from the ground truth of every matched pair.
    ///
    /// Frames the fitter rejects are skipped. Returns `Ok(None)` when no
    /// model could be fitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the output folder cannot be listed or a
    /// ground-truth image cannot be decoded.
    pub fn fit_niqe_model(&self, patch_size: usize) -> Result<Option<NiqeModel>> {
        let mut fitter = NiqeFitter::new(patch_size);

        for candidate in self.discover()? {
            let PairCandidate::Matched { gt_path, .. } = candidate else {
                continue;
            };
            let gray = to_gray_unit(load_rgb8(&gt_path)?.as_ref());
            match fitter.add_image(&gray) {
                Ok(kept) => log::debug!("{}: {} pristine patches", gt_path.display(), kept),
                Err(e) => log::debug!("{}: not used for NIQE model: {}", gt_path.display(), e),
            }
        }

        let patches = fitter.patch_count();
        match fitter.finish() {
            Ok(model) => {
                log::info!("fitted NIQE model from {} patches", patches);
                Ok(Some(model))
            }
            Err(e) => {
                log::warn!("could not fit a NIQE model from the ground truth: {}", e);
                Ok(None)
            }
        }
    }

    /// Evaluate every pair in sorted order.
    ///
    /// Missing ground truth and estimator failures are reported through
    /// `on_event` and do not stop the run. Any other failure aborts it.
    pub fn run<F>(&self, mut on_event: F) -> Result<DatasetReport>
    where
        F: FnMut(PairEvent<'_>),
    {
        let mut pairs = Vec::new();
        let mut skipped = Vec::new();

        for candidate in self.discover()? {
            match candidate {
                PairCandidate::MissingGroundTruth { name, gt_path } => {
                    log::debug!("{}: no ground truth at {}", name, gt_path.display());
                    on_event(PairEvent::MissingGroundTruth {
                        name: &name,
                        gt_path: &gt_path,
                    });
                    skipped.push(name);
                }
                PairCandidate::Matched { name, output_path, gt_path } => {
                    log::debug!("evaluating {}", name);
                    let gt = load_rgb8(&gt_path)?;
                    let output = load_rgb8(&output_path)?;

                    let metrics = self.evaluate_pair(&name, &gt, &output, &mut on_event)?;
                    let report = PairReport {
                        name,
                        output_path,
                        gt_path,
                        width: gt.width(),
                        height: gt.height(),
                        metrics,
                    };
                    on_event(PairEvent::Evaluated(&report));
                    pairs.push(report);
                }
            }
        }

        Ok(DatasetReport::new(pairs, skipped))
    }

    /// Compute the configured metrics for one loaded pair.
    pub fn evaluate_pair<F>(
        &self,
        name: &str,
        gt: &ImgVec<RGB8>,
        output: &ImgVec<RGB8>,
        on_event: &mut F,
    ) -> Result<MetricResult>
    where
        F: FnMut(PairEvent<'_>),
    {
        let metrics = &self.config.metrics;
        let mut result = MetricResult::default();

        if metrics.psnr {
            result.psnr = Some(calculate_psnr(gt.as_ref(), output.as_ref())?);
        }

        if metrics.ssim {
            result.ssim = Some(calculate_ssim(gt.as_ref(), output.as_ref())?);
        }

        if metrics.niqe {
            let (gt_niqe, output_niqe) = self.no_reference_scores(name, gt, output, on_event);
            result.gt_niqe = Some(gt_niqe);
            result.output_niqe = Some(output_niqe);
        }

        #[cfg(feature = "dssim")]
        if metrics.dssim {
            result.dssim = Some(crate::metrics::dssim::calculate_dssim(gt.as_ref(), output.as_ref())?);
        }

        #[cfg(not(feature = "dssim"))]
        if metrics.dssim {
            return Err(crate::Error::MetricCalculation {
                metric: "DSSIM".to_string(),
                reason: "built without the dssim feature".to_string(),
            });
        }

        Ok(result)
    }

    /// Score the ground truth, then the output. If either fails, both
    /// values are NaN and a single event is emitted.
    fn no_reference_scores<F>(
        &self,
        name: &str,
        gt: &ImgVec<RGB8>,
        output: &ImgVec<RGB8>,
        on_event: &mut F,
    ) -> (f64, f64)
    where
        F: FnMut(PairEvent<'_>),
    {
        let score = |side: ImageSide, img: &ImgVec<RGB8>| {
            self.estimator
                .score(&to_gray_unit(img.as_ref()))
                .map_err(|error| (side, error))
        };

        let scores = score(ImageSide::GroundTruth, gt)
            .and_then(|gt_score| Ok((gt_score, score(ImageSide::Output, output)?)));

        match scores {
            Ok(scores) => scores,
            Err((side, error)) => {
                log::debug!("{} failed on {} ({:?}): {}", self.estimator.name(), name, side, error);
                on_event(PairEvent::EstimatorFailed {
                    name,
                    side,
                    error: &error,
                });
                (f64::NAN, f64::NAN)
            }
        }
    }
}
