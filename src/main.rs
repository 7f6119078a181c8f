use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use frame_compare_report::logging::{Verbosity, init_subscriber};
use frame_compare_report::protocol::{done_message, error_message};
use frame_compare_report::{PipelineConfig, PipelineInputs, ReportError, Threshold, UrlBases, pool};

/// Compare a frame-capture run against emulator and hardware goldens.
#[derive(Parser, Debug)]
#[command(name = "frame-compare-report", version)]
struct Cli {
    /// Results directory of the run under test.
    source: PathBuf,

    /// Emulator golden results; may hold several versioned runs.
    emulator_golden: PathBuf,

    /// Branch or run name shown in the report.
    branch: String,

    /// Hardware golden results. Missing or unreadable means no hardware diffs.
    #[arg(long)]
    hardware_golden: Option<PathBuf>,

    /// JSON file of known issues: {"suite": {"test": ["description"]}}.
    #[arg(long)]
    known_issues: Option<PathBuf>,

    /// Largest dissimilarity score (0..=1) still treated as a match.
    #[arg(long, default_value_t = 0.0)]
    threshold: f64,

    /// Worker threads; defaults to the available parallelism.
    #[arg(long)]
    jobs: Option<usize>,

    /// Directory into which report directories are generated.
    #[arg(long, default_value = "site")]
    output_dir: PathBuf,

    /// Only compare against this emulator golden version label.
    #[arg(long)]
    emulator_version: Option<String>,

    #[arg(long)]
    results_base_url: Option<String>,

    #[arg(long)]
    emulator_golden_base_url: Option<String>,

    #[arg(long)]
    hardware_golden_base_url: Option<String>,

    /// Base URL the output directory is published at.
    #[arg(long)]
    site_base_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,

    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn inputs(&self) -> PipelineInputs {
        let mut inputs = PipelineInputs::new(&self.source, &self.emulator_golden, &self.branch);
        if let Some(root) = &self.hardware_golden {
            inputs = inputs.with_hardware_golden(root);
        }
        if let Some(path) = &self.known_issues {
            inputs = inputs.with_known_issues(path);
        }
        inputs
    }

    fn config(&self) -> Result<PipelineConfig, ReportError> {
        Ok(PipelineConfig::new(&self.output_dir)
            .with_threshold(Threshold::new(self.threshold)?)
            .with_workers(self.jobs.unwrap_or_else(pool::default_workers))
            .with_emulator_version(self.emulator_version.clone())
            .with_urls(UrlBases {
                results: self.results_base_url.clone(),
                emulator_golden: self.emulator_golden_base_url.clone(),
                hardware_golden: self.hardware_golden_base_url.clone(),
                site: self.site_base_url.clone(),
            }))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string(value).context("failed to serialize status")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").context("failed to write status to stdout")?;
    Ok(())
}

fn try_main(cli: &Cli) -> Result<ExitCode> {
    let outcome = cli
        .config()
        .and_then(|config| frame_compare_report::run(&cli.inputs(), &config));

    match outcome {
        Ok(summary) => {
            print_json(&done_message(&summary))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(code = e.code(), "{e}");
            print_json(&error_message(&e))?;
            Ok(ExitCode::from(2))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet), cli.no_color);

    match try_main(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_positionals_and_options() {
        let cli = Cli::try_parse_from([
            "frame-compare-report",
            "results",
            "goldens/emulator",
            "pr/42",
            "--hardware-golden",
            "goldens/hw",
            "--threshold",
            "0.05",
            "--jobs",
            "3",
            "--output-dir",
            "out",
        ])
        .unwrap();

        assert_eq!(cli.branch, "pr/42");
        let inputs = cli.inputs();
        assert_eq!(inputs.hardware_golden_root, Some(PathBuf::from("goldens/hw")));
        assert!(inputs.known_issues.is_none());

        let config = cli.config().unwrap();
        assert_eq!(config.threshold.value(), 0.05);
        assert_eq!(config.workers, 3);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let cli =
            Cli::try_parse_from(["frame-compare-report", "a", "b", "c", "--threshold", "1.5"])
                .unwrap();
        assert_eq!(cli.config().unwrap_err().code(), "INVALID_THRESHOLD");
    }
}
