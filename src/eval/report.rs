//! Report types for evaluation results.
//!
//! This module defines the per-pair and dataset-wide results, which can be
//! serialized to JSON or CSV. NaN values serialize as JSON `null` and as
//! `NaN` in CSV.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::MetricResult;
use crate::stats::{mean, nan_mean};

/// Metrics for one output/ground-truth pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    /// Output filename, used as the pair identifier.
    pub name: String,

    /// Path to the model output.
    pub output_path: PathBuf,

    /// Path to the ground truth.
    pub gt_path: PathBuf,

    /// Image dimensions.
    pub width: usize,
    pub height: usize,

    /// Metric values for this pair.
    pub metrics: MetricResult,
}

/// Dataset-wide averages.
///
/// PSNR, SSIM and DSSIM use a plain mean: with no pairs they are NaN. The
/// NIQE averages ignore failed (NaN) entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Number of pairs that contributed.
    pub pair_count: usize,
    /// Mean PSNR in dB.
    pub psnr: f64,
    /// Mean SSIM.
    pub ssim: f64,
    /// NaN-aware mean NIQE of the ground-truth images.
    pub gt_niqe: f64,
    /// NaN-aware mean NIQE of the outputs.
    pub output_niqe: f64,
    /// Mean DSSIM, when it was computed.
    pub dssim: Option<f64>,
}

impl DatasetSummary {
    /// Aggregate the metrics of `pairs`.
    #[must_use]
    pub fn from_pairs(pairs: &[PairReport]) -> Self {
        let column = |f: fn(&MetricResult) -> Option<f64>| -> Vec<f64> {
            pairs.iter().filter_map(|p| f(&p.metrics)).collect()
        };

        let dssim = column(|m| m.dssim);

        Self {
            pair_count: pairs.len(),
            psnr: mean(&column(|m| m.psnr)),
            ssim: mean(&column(|m| m.ssim)),
            gt_niqe: nan_mean(&column(|m| m.gt_niqe)),
            output_niqe: nan_mean(&column(|m| m.output_niqe)),
            dssim: if dssim.is_empty() { None } else { Some(mean(&dssim)) },
        }
    }
}

/// Result of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetReport {
    /// Evaluated pairs, in sorted filename order.
    pub pairs: Vec<PairReport>,

    /// Output filenames skipped because their ground truth was missing.
    pub skipped: Vec<String>,

    /// Averages over `pairs`.
    pub summary: DatasetSummary,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DatasetReport {
    /// Build a report and its summary.
    #[must_use]
    pub fn new(pairs: Vec<PairReport>, skipped: Vec<String>) -> Self {
        let summary = DatasetSummary::from_pairs(&pairs);
        Self {
            pairs,
            skipped,
            summary,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Values of one metric across all pairs, in pair order.
    pub fn values(&self, metric: fn(&MetricResult) -> Option<f64>) -> Vec<f64> {
        self.pairs.iter().filter_map(|p| metric(&p.metrics)).collect()
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Write one CSV row per pair.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        wtr.write_record([
            "pair",
            "output_path",
            "gt_path",
            "width",
            "height",
            "psnr",
            "ssim",
            "gt_niqe",
            "output_niqe",
            "dssim",
        ])?;

        let cell = |v: Option<f64>| v.map_or(String::new(), |v| v.to_string());

        for pair in &self.pairs {
            wtr.write_record([
                &pair.name,
                &pair.output_path.display().to_string(),
                &pair.gt_path.display().to_string(),
                &pair.width.to_string(),
                &pair.height.to_string(),
                &cell(pair.metrics.psnr),
                &cell(pair.metrics.ssim),
                &cell(pair.metrics.gt_niqe),
                &cell(pair.metrics.output_niqe),
                &cell(pair.metrics.dssim),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, psnr: f64, ssim: f64, gt_niqe: f64, output_niqe: f64) -> PairReport {
        PairReport {
            name: name.to_string(),
            output_path: PathBuf::from(format!("out/{name}")),
            gt_path: PathBuf::from(format!("gt/{name}")),
            width: 8,
            height: 8,
            metrics: MetricResult {
                psnr: Some(psnr),
                ssim: Some(ssim),
                gt_niqe: Some(gt_niqe),
                output_niqe: Some(output_niqe),
                dssim: None,
            },
        }
    }

    #[test]
    fn test_summary_means() {
        let pairs = vec![
            pair("a_rain.png", 30.0, 0.8, 4.0, f64::NAN),
            pair("b_rain.png", 40.0, 0.9, f64::NAN, 6.0),
        ];
        let summary = DatasetSummary::from_pairs(&pairs);
        assert_eq!(summary.pair_count, 2);
        assert!((summary.psnr - 35.0).abs() < 1e-9);
        assert!((summary.ssim - 0.85).abs() < 1e-9);
        assert_eq!(summary.gt_niqe, 4.0);
        assert_eq!(summary.output_niqe, 6.0);
        assert!(summary.dssim.is_none());
    }

    #[test]
    fn test_summary_empty_is_nan() {
        let summary = DatasetSummary::from_pairs(&[]);
        assert_eq!(summary.pair_count, 0);
        assert!(summary.psnr.is_nan());
        assert!(summary.ssim.is_nan());
        assert!(summary.gt_niqe.is_nan());
    }

    #[test]
    fn test_json_nan_is_null() {
        let report = DatasetReport::new(vec![pair("a_rain.png", 30.0, 0.8, f64::NAN, f64::NAN)], vec![]);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["summary"]["gt_niqe"].is_null());
        assert_eq!(json["pairs"][0]["metrics"]["psnr"], 30.0);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let report = DatasetReport::new(
            vec![pair("a_rain.png", 30.5, 0.75, 3.0, f64::NAN)],
            vec!["b_rain.png".to_string()],
        );
        report.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("pair,output_path,gt_path"));
        assert!(lines[1].starts_with("a_rain.png,"));
        assert!(lines[1].ends_with(",30.5,0.75,3,NaN,"));
    }

    #[test]
    fn test_values_column() {
        let report = DatasetReport::new(
            vec![pair("a", 1.0, 0.1, 0.0, 0.0), pair("b", 2.0, 0.2, 0.0, 0.0)],
            vec![],
        );
        assert_eq!(report.values(|m| m.psnr), [1.0, 2.0]);
    }
}
