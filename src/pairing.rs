//! Pairing of model outputs with their ground-truth images.
//!
//! The output folder is listed in sorted order; every file accepted by the
//! [`PairingRule`] gets a ground-truth filename, and the candidate is
//! classified by whether that file exists in the ground-truth folder.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maps an output filename to the filename of its ground truth.
///
/// Returning `None` means the file is not a model output and is ignored.
pub trait PairingRule: Send + Sync {
    /// Ground-truth filename for `output_name`, if it is an output at all.
    fn ground_truth_name(&self, output_name: &str) -> Option<String>;
}

impl<F> PairingRule for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn ground_truth_name(&self, output_name: &str) -> Option<String> {
        self(output_name)
    }
}

/// Tag-substitution naming convention.
///
/// An output is any file ending in `{output_tag}.{extension}`. Its ground
/// truth is found by replacing `output_tag` with `gt_tag` everywhere in the
/// name, or, when `gt_extension` is set, by swapping the whole suffix for
/// `{gt_tag}.{gt_extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixPairing {
    /// Tag marking a model output (e.g. `_rain`).
    pub output_tag: String,
    /// Tag marking the ground truth (e.g. `_clean`).
    pub gt_tag: String,
    /// Extension of output files, without the dot.
    pub extension: String,
    /// Extension of ground-truth files when it differs from the output's.
    pub gt_extension: Option<String>,
}

impl SuffixPairing {
    /// `x_rain.png` → `x_clean.png`.
    #[must_use]
    pub fn rain_to_clean() -> Self {
        Self {
            output_tag: "_rain".to_string(),
            gt_tag: "_clean".to_string(),
            extension: "png".to_string(),
            gt_extension: None,
        }
    }

    /// `x_rain.png` → `x_clean.jpg`.
    #[must_use]
    pub fn rain_png_to_clean_jpg() -> Self {
        Self {
            gt_extension: Some("jpg".to_string()),
            ..Self::rain_to_clean()
        }
    }

    /// Filename suffix that marks a model output.
    #[must_use]
    pub fn output_suffix(&self) -> String {
        format!("{}.{}", self.output_tag, self.extension)
    }
}

impl Default for SuffixPairing {
    fn default() -> Self {
        Self::rain_to_clean()
    }
}

impl PairingRule for SuffixPairing {
    fn ground_truth_name(&self, output_name: &str) -> Option<String> {
        let suffix = self.output_suffix();
        let stem = output_name.strip_suffix(&suffix)?;

        Some(match &self.gt_extension {
            None => output_name.replace(&self.output_tag, &self.gt_tag),
            Some(ext) => format!("{stem}{}.{ext}", self.gt_tag),
        })
    }
}

/// One output file and what was found for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairCandidate {
    /// Both images exist.
    Matched {
        /// Output filename, used as the pair identifier.
        name: String,
        /// Path to the model output.
        output_path: PathBuf,
        /// Path to the ground truth.
        gt_path: PathBuf,
    },

    /// The derived ground-truth file does not exist.
    MissingGroundTruth {
        /// Output filename.
        name: String,
        /// Path where the ground truth was expected.
        gt_path: PathBuf,
    },
}

impl PairCandidate {
    /// Output filename of this candidate.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Matched { name, .. } | Self::MissingGroundTruth { name, .. } => name,
        }
    }
}

/// List `output_dir` in sorted order and pair each output with its ground truth.
///
/// Files the rule does not accept are never returned. Names that are not
/// valid UTF-8 are skipped.
pub fn discover_pairs(
    output_dir: &Path,
    gt_dir: &Path,
    rule: &dyn PairingRule,
) -> Result<Vec<PairCandidate>> {
    let entries = fs::read_dir(output_dir).map_err(|e| {
        Error::Discovery(format!("Failed to read directory {}: {}", output_dir.display(), e))
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::Discovery(format!("Failed to read entry in {}: {}", output_dir.display(), e))
        })?;

        if !entry.path().is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => log::debug!("skipping non UTF-8 filename {:?}", raw),
        }
    }
    names.sort();

    let candidates = names
        .into_iter()
        .filter_map(|name| {
            let gt_name = rule.ground_truth_name(&name)?;
            let gt_path = gt_dir.join(gt_name);
            let output_path = output_dir.join(&name);

            Some(if gt_path.exists() {
                PairCandidate::Matched { name, output_path, gt_path }
            } else {
                PairCandidate::MissingGroundTruth { name, gt_path }
            })
        })
        .collect();

    Ok(candidates)
}
