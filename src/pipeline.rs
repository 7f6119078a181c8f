//! End-to-end report generation.
//!
//! A run either produces a complete report directory or nothing: input roots
//! are validated before any output is touched, and all output is staged and
//! swapped into place at the end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::align::Aligner;
use crate::assemble::assemble;
use crate::config::{PipelineConfig, PipelineInputs};
use crate::error::{ReportError, Result};
use crate::known_issues::KnownIssues;
use crate::locator::{self, ArtifactSet, RunDir, SetRole, join_url};
use crate::model::ComparisonReport;
use crate::output::{ReportWriter, branch_dir_name};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report_path: PathBuf,
    pub report: ComparisonReport,
}

pub fn run(inputs: &PipelineInputs, config: &PipelineConfig) -> Result<RunSummary> {
    locator::ensure_readable(SetRole::Source, &inputs.source_root)?;
    locator::ensure_readable(SetRole::EmulatorGolden, &inputs.emulator_golden_root)?;

    let known_issues = match &inputs.known_issues {
        Some(path) => KnownIssues::load(path)?,
        None => KnownIssues::new(),
    };

    let runs = select_runs(&inputs.emulator_golden_root, config.emulator_version.as_deref())?;
    let source = load_source(&inputs.source_root, config.urls.results.as_deref());
    let hardware = load_hardware(
        inputs.hardware_golden_root.as_deref(),
        config.urls.hardware_golden.as_deref(),
    );

    info!(
        branch = %inputs.branch,
        source_version = %source.version,
        source_artifacts = source.len(),
        hardware_artifacts = hardware.len(),
        versions = runs.len(),
        "starting comparison"
    );

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| ReportError::output_write(&config.output_dir, e))?;
    let writer = ReportWriter::begin(&config.output_dir, &inputs.branch)?;
    let aligner = Aligner {
        threshold: config.threshold,
        known_issues: &known_issues,
        report_dir: writer.staging_dir().to_path_buf(),
        report_url: config
            .urls
            .site
            .as_deref()
            .map(|base| join_url(base, &branch_dir_name(&inputs.branch))),
        workers: config.workers,
    };

    let mut per_version = BTreeMap::new();
    for run in runs {
        let url_base = config
            .urls
            .emulator_golden
            .as_deref()
            .map(|base| join_url(base, &run.version));
        let emulator = ArtifactSet::load(
            SetRole::EmulatorGolden,
            run.version.clone(),
            &run.path,
            url_base.as_deref(),
        );
        let results = aligner.align(&source, &emulator, &hardware)?;
        info!(version = %run.version, tests = results.len(), "version aligned");
        per_version.insert(run.version, results);
    }

    let report = assemble(&inputs.branch, &source.version, config.threshold, per_version);
    let report_path = writer.commit(&report)?;
    Ok(RunSummary { report_path, report })
}

/// The source root is one run. A single marked run below it supplies the
/// version label; otherwise the root's own name does.
fn load_source(root: &Path, url_base: Option<&str>) -> ArtifactSet {
    let mut runs = locator::discover_runs(root);
    let run = if runs.len() == 1 {
        runs.remove(0)
    } else {
        warn!(
            root = %root.display(),
            runs = runs.len(),
            "source root holds several runs; scanning it as one"
        );
        RunDir {
            version: locator::root_label(root),
            path: root.to_path_buf(),
        }
    };
    ArtifactSet::load(SetRole::Source, run.version, &run.path, url_base)
}

fn load_hardware(root: Option<&Path>, url_base: Option<&str>) -> ArtifactSet {
    let Some(root) = root else {
        return ArtifactSet::empty(SetRole::HardwareGolden, "none", Path::new(""));
    };
    let label = locator::root_label(root);
    if let Err(e) = locator::ensure_readable(SetRole::HardwareGolden, root) {
        warn!(
            error = %e,
            "hardware golden set unavailable; hardware comparisons will be missing"
        );
        return ArtifactSet::empty(SetRole::HardwareGolden, label, root);
    }
    ArtifactSet::load(SetRole::HardwareGolden, label, root, url_base)
}

/// Every marked run below the emulator-golden root, or only the requested
/// one. Naming a version that does not exist is fatal.
fn select_runs(root: &Path, only: Option<&str>) -> Result<Vec<RunDir>> {
    let runs = locator::discover_runs(root);
    let Some(only) = only else {
        return Ok(runs);
    };
    let selected: Vec<RunDir> = runs.into_iter().filter(|r| r.version == only).collect();
    if selected.is_empty() {
        return Err(ReportError::UnknownEmulatorVersion {
            version: only.to_string(),
            root: root.to_path_buf(),
        });
    }
    Ok(selected)
}
