//! restore-eval CLI - paired image-restoration evaluation

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use restore_eval::{EvalConfig, EvalSession, MetricConfig, Niqe, NiqeModel, SuffixPairing};

mod output;

/// Evaluate restored images against their ground truth (PSNR, SSIM, NIQE).
#[derive(Parser, Debug)]
#[command(name = "restore-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder with the model outputs
    #[arg(long, visible_alias = "output_folder", env = "RESTORE_EVAL_OUTPUT_FOLDER")]
    output_folder: PathBuf,

    /// Folder with the ground-truth images
    #[arg(long, visible_alias = "gt_folder", env = "RESTORE_EVAL_GT_FOLDER")]
    gt_folder: PathBuf,

    /// Tag marking output filenames
    #[arg(long, default_value = "_rain")]
    output_tag: String,

    /// Tag that replaces the output tag in ground-truth filenames
    #[arg(long, default_value = "_clean")]
    gt_tag: String,

    /// Extension of output files
    #[arg(long, default_value = "png")]
    extension: String,

    /// Extension of ground-truth files, if different
    #[arg(long)]
    gt_extension: Option<String>,

    /// Pristine NIQE model (JSON)
    #[arg(long, env = "RESTORE_EVAL_NIQE_MODEL", conflicts_with_all = ["no_niqe", "fit_niqe_model"])]
    niqe_model: Option<PathBuf>,

    /// Fit the NIQE model from the ground-truth images instead of loading one
    #[arg(long, conflicts_with = "no_niqe")]
    fit_niqe_model: bool,

    /// Save the fitted NIQE model to this file
    #[arg(long, requires = "fit_niqe_model")]
    save_niqe_model: Option<PathBuf>,

    /// Skip NIQE
    #[arg(long)]
    no_niqe: bool,

    /// Also compute DSSIM (needs the `dssim` feature)
    #[arg(long)]
    dssim: bool,

    /// Write a JSON report
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write a CSV report
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn eval_config(&self) -> EvalConfig {
        let pairing = SuffixPairing {
            output_tag: self.output_tag.clone(),
            gt_tag: self.gt_tag.clone(),
            extension: self.extension.clone(),
            gt_extension: self.gt_extension.clone(),
        };

        let mut metrics = MetricConfig::standard();
        metrics.niqe = !self.no_niqe;
        metrics.dssim = self.dssim;

        EvalConfig::builder()
            .output_dir(&self.output_folder)
            .gt_dir(&self.gt_folder)
            .pairing(pairing)
            .metrics(metrics)
            .build()
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

/// Pick the NIQE model: load it, fit one from the ground truth, or none.
fn niqe_model(cli: &Cli, session: &EvalSession) -> Result<Option<NiqeModel>> {
    if let Some(path) = &cli.niqe_model {
        let model = NiqeModel::load(path)
            .with_context(|| format!("Failed to load NIQE model: {}", path.display()))?;
        log::info!("loaded NIQE model from {} (patch size {})", path.display(), model.patch_size);
        return Ok(Some(model));
    }

    if !cli.fit_niqe_model {
        log::warn!("no NIQE model given (--niqe-model or --fit-niqe-model); NIQE values will be nan");
        return Ok(None);
    }

    let model = session
        .fit_niqe_model(NiqeModel::DEFAULT_PATCH_SIZE)
        .context("Failed to fit NIQE model from the ground truth")?;

    if let (Some(model), Some(path)) = (&model, &cli.save_niqe_model) {
        model
            .save(path)
            .with_context(|| format!("Failed to save NIQE model: {}", path.display()))?;
        log::info!("saved NIQE model to {}", path.display());
    }

    Ok(model)
}

fn run(cli: &Cli) -> Result<()> {
    if cli.dssim && !cfg!(feature = "dssim") {
        anyhow::bail!("--dssim requires a build with the `dssim` feature");
    }

    let mut session = EvalSession::new(cli.eval_config());

    if !cli.no_niqe {
        if let Some(model) = niqe_model(cli, &session)? {
            session = session.with_estimator(Box::new(Niqe::new(model)));
        }
    }

    let mut stdout = io::stdout().lock();
    let mut printed = Ok(());
    let report = session
        .run(|event| {
            if printed.is_ok() {
                printed = output::write_event(&mut stdout, event);
            }
        })
        .with_context(|| format!("Failed to evaluate {}", cli.output_folder.display()))?;
    printed.context("Failed to write to stdout")?;

    output::write_averages(&mut stdout, &report).context("Failed to write to stdout")?;
    if cli.verbose {
        output::write_distribution(&mut stdout, &report).context("Failed to write to stdout")?;
    }
    stdout.flush()?;

    if let Some(path) = &cli.json {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }

    if let Some(path) = &cli.csv {
        report
            .write_csv(path)
            .with_context(|| format!("Failed to write CSV report: {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_underscore_aliases() {
        let cli = Cli::try_parse_from([
            "restore-eval",
            "--output_folder",
            "results",
            "--gt_folder",
            "gt",
        ])
        .unwrap();
        assert_eq!(cli.output_folder, PathBuf::from("results"));
        assert_eq!(cli.gt_folder, PathBuf::from("gt"));
        assert_eq!(cli.output_tag, "_rain");
        assert!(cli.gt_extension.is_none());
    }

    #[test]
    fn test_eval_config_from_flags() {
        let cli = Cli::try_parse_from([
            "restore-eval",
            "--output-folder",
            "results",
            "--gt-folder",
            "gt",
            "--gt-extension",
            "jpg",
            "--no-niqe",
        ])
        .unwrap();
        let config = cli.eval_config();
        assert_eq!(config.pairing, SuffixPairing::rain_png_to_clean_jpg());
        assert!(!config.metrics.niqe);
        assert!(!config.metrics.dssim);
        assert!(config.metrics.psnr);
    }

    #[test]
    fn test_dssim_flag() {
        let cli = Cli::try_parse_from(["restore-eval", "--output-folder", "o", "--gt-folder", "g", "--dssim"]).unwrap();
        assert!(cli.eval_config().metrics.dssim);
    }

    #[cfg(not(feature = "dssim"))]
    #[test]
    fn test_dssim_flag_rejected_without_feature() {
        let cli = Cli::try_parse_from(["restore-eval", "--output-folder", "o", "--gt-folder", "g", "--dssim"]).unwrap();
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("dssim"));
    }

    #[test]
    fn test_niqe_model_not_fitted_by_default() {
        let cli = Cli::try_parse_from(["restore-eval", "--output-folder", "o", "--gt-folder", "g"]).unwrap();
        assert!(!cli.fit_niqe_model);
        let session = EvalSession::new(cli.eval_config());
        assert!(niqe_model(&cli, &session).unwrap().is_none());
    }

    #[test]
    fn test_save_requires_fit() {
        let result = Cli::try_parse_from([
            "restore-eval",
            "--output-folder",
            "o",
            "--gt-folder",
            "g",
            "--save-niqe-model",
            "model.json",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "restore-eval",
            "--output-folder",
            "o",
            "--gt-folder",
            "g",
            "--fit-niqe-model",
            "--save-niqe-model",
            "model.json",
        ])
        .unwrap();
        assert!(cli.fit_niqe_model);
    }

    #[test]
    fn test_model_flags_conflict() {
        let result = Cli::try_parse_from([
            "restore-eval",
            "--output-folder",
            "results",
            "--gt-folder",
            "gt",
            "--no-niqe",
            "--niqe-model",
            "model.json",
        ]);
        assert!(result.is_err());
    }
}
