//! Human-readable report output.
//!
//! Floats are printed the way Python prints them (`nan`, `35.0`, `1e-05`),
//! so existing scripts that scrape this output keep working.

use std::io::{self, Write};

use restore_eval::{DatasetReport, MetricResult, PSNR_PERFECT_MATCH, PairEvent, Summary};

/// Format a float like Python's `repr`.
pub fn py_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let sci = format!("{v:e}");
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }

    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn separator(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{:-<40}", "")
}

/// Write one progress event as it arrives.
pub fn write_event(out: &mut impl Write, event: PairEvent<'_>) -> io::Result<()> {
    match event {
        PairEvent::Evaluated(pair) => {
            writeln!(out, "Image Pair: {}", pair.name)?;
            let m = &pair.metrics;
            if let Some(psnr) = m.psnr {
                // The perfect-match sentinel prints as an integer.
                if psnr == PSNR_PERFECT_MATCH {
                    writeln!(out, "PSNR: {PSNR_PERFECT_MATCH:.0} dB")?;
                } else {
                    writeln!(out, "PSNR: {} dB", py_float(psnr))?;
                }
            }
            if let Some(ssim) = m.ssim {
                writeln!(out, "SSIM: {}", py_float(ssim))?;
            }
            if let Some(niqe) = m.gt_niqe {
                writeln!(out, "GT NIQE: {}", py_float(niqe))?;
            }
            if let Some(niqe) = m.output_niqe {
                writeln!(out, "Output NIQE: {}", py_float(niqe))?;
            }
            if let Some(dssim) = m.dssim {
                writeln!(out, "DSSIM: {}", py_float(dssim))?;
            }
            separator(out)
        }
        PairEvent::MissingGroundTruth { name, .. } => {
            writeln!(out, "Warning: Corresponding GT image for {} not found.", name)
        }
        PairEvent::EstimatorFailed { error, .. } => writeln!(out, "An error occurred: {}", error),
    }
}

/// Write the dataset averages.
pub fn write_averages(out: &mut impl Write, report: &DatasetReport) -> io::Result<()> {
    let s = &report.summary;
    writeln!(out, "\nAverages for the entire dataset:")?;
    writeln!(out, "Average PSNR: {} dB", py_float(s.psnr))?;
    writeln!(out, "Average SSIM: {}", py_float(s.ssim))?;
    writeln!(out, "Average GT NIQE: {}", py_float(s.gt_niqe))?;
    writeln!(out, "Average Output NIQE: {}", py_float(s.output_niqe))?;
    if let Some(dssim) = s.dssim {
        writeln!(out, "Average DSSIM: {}", py_float(dssim))?;
    }
    Ok(())
}

/// Write per-metric distributions (verbose mode).
pub fn write_distribution(out: &mut impl Write, report: &DatasetReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Distribution over {} pairs ({} skipped):",
        report.pairs.len(),
        report.skipped.len()
    )?;
    separator(out)?;

    let columns: [(&str, fn(&MetricResult) -> Option<f64>); 5] = [
        ("PSNR (dB)", |m| m.psnr),
        ("SSIM", |m| m.ssim),
        ("GT NIQE", |m| m.gt_niqe),
        ("Output NIQE", |m| m.output_niqe),
        ("DSSIM", |m| m.dssim),
    ];

    for (label, metric) in columns {
        if let Some(summary) = Summary::compute(&report.values(metric)) {
            write_summary(out, label, &summary)?;
        }
    }
    Ok(())
}

fn write_summary(out: &mut impl Write, label: &str, s: &Summary) -> io::Result<()> {
    writeln!(out, "{}:", label)?;
    writeln!(out, "  Mean: {:.4}, Median: {:.4}", s.mean, s.median)?;
    writeln!(out, "  Min: {:.4}, Max: {:.4}", s.min, s.max)?;
    writeln!(out, "  P5: {:.4}, P25: {:.4}, P75: {:.4}, P95: {:.4}", s.p5, s.p25, s.p75, s.p95)?;
    writeln!(out, "  StdDev: {:.4}, n={}", s.std_dev, s.count)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use restore_eval::{NiqeError, PairReport};

    use super::*;

    fn pair(psnr: f64, ssim: f64, gt_niqe: f64, output_niqe: f64) -> PairReport {
        PairReport {
            name: "img1_rain.png".to_string(),
            output_path: PathBuf::from("out/img1_rain.png"),
            gt_path: PathBuf::from("gt/img1_clean.png"),
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

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_py_float() {
        assert_eq!(py_float(f64::NAN), "nan");
        assert_eq!(py_float(f64::INFINITY), "inf");
        assert_eq!(py_float(35.0), "35.0");
        assert_eq!(py_float(0.0), "0.0");
        assert_eq!(py_float(28.13), "28.13");
        assert_eq!(py_float(0.95), "0.95");
        assert_eq!(py_float(1.5e-5), "1.5e-05");
        assert_eq!(py_float(1e16), "1e+16");
    }

    #[test]
    fn test_pair_and_missing_lines() {
        let report = pair(100.0, 0.95, 3.5, f64::NAN);
        let text = render(|out| {
            write_event(out, PairEvent::Evaluated(&report))?;
            write_event(
                out,
                PairEvent::MissingGroundTruth {
                    name: "img2_rain.png",
                    gt_path: Path::new("gt/img2_clean.png"),
                },
            )
        });

        let expected = "\
Image Pair: img1_rain.png
PSNR: 100 dB
SSIM: 0.95
GT NIQE: 3.5
Output NIQE: nan
----------------------------------------
Warning: Corresponding GT image for img2_rain.png not found.
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_psnr_below_sentinel() {
        let report = pair(28.5, 0.5, 1.0, 2.0);
        let text = render(|out| write_event(out, PairEvent::Evaluated(&report)));
        assert!(text.contains("PSNR: 28.5 dB\n"));
    }

    #[test]
    fn test_error_line() {
        let error = NiqeError::MissingModel;
        let text = render(|out| {
            write_event(
                out,
                PairEvent::EstimatorFailed {
                    name: "img1_rain.png",
                    side: restore_eval::ImageSide::GroundTruth,
                    error: &error,
                },
            )
        });
        assert_eq!(text, "An error occurred: no pristine NIQE model available\n");
    }

    #[test]
    fn test_averages_block() {
        let report = DatasetReport::new(vec![pair(100.0, 0.95, 3.5, f64::NAN)], vec![]);
        let text = render(|out| write_averages(out, &report));

        let expected = "
Averages for the entire dataset:
Average PSNR: 100.0 dB
Average SSIM: 0.95
Average GT NIQE: 3.5
Average Output NIQE: nan
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_distribution_lists_percentiles() {
        let report = DatasetReport::new(vec![pair(30.0, 0.9, 3.0, 4.0), pair(40.0, 0.8, 5.0, 6.0)], vec![]);
        let text = render(|out| write_distribution(out, &report));
        assert!(text.starts_with("\nDistribution over 2 pairs (0 skipped):\n"));
        assert!(text.contains("PSNR (dB):\n  Mean: 35.0000, Median: 35.0000\n"));
        assert!(text.contains("  P5: "));
        assert!(!text.contains("DSSIM"));
    }
}
