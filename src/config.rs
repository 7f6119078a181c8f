use std::path::PathBuf;

use crate::classify::Threshold;
use crate::pool;

/// Public base URLs for each published tree. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlBases {
    pub results: Option<String>,
    pub emulator_golden: Option<String>,
    pub hardware_golden: Option<String>,
    /// Where the generated site (report directories) is served from.
    pub site: Option<String>,
}

/// The three input roots plus the optional known-issues table.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub source_root: PathBuf,
    pub emulator_golden_root: PathBuf,
    pub hardware_golden_root: Option<PathBuf>,
    pub known_issues: Option<PathBuf>,
    /// Passed through to the report untouched.
    pub branch: String,
}

impl PipelineInputs {
    pub fn new(
        source_root: impl Into<PathBuf>,
        emulator_golden_root: impl Into<PathBuf>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            emulator_golden_root: emulator_golden_root.into(),
            hardware_golden_root: None,
            known_issues: None,
            branch: branch.into(),
        }
    }

    pub fn with_hardware_golden(mut self, root: impl Into<PathBuf>) -> Self {
        self.hardware_golden_root = Some(root.into());
        self
    }

    pub fn with_known_issues(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_issues = Some(path.into());
        self
    }
}

/// Tunables for one report run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub threshold: Threshold,
    pub workers: usize,
    /// Restrict the report to one emulator golden version.
    pub emulator_version: Option<String>,
    pub urls: UrlBases,
}

impl PipelineConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            threshold: Threshold::EXACT,
            workers: pool::default_workers(),
            emulator_version: None,
            urls: UrlBases::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_emulator_version(mut self, version: Option<String>) -> Self {
        self.emulator_version = version;
        self
    }

    pub fn with_urls(mut self, urls: UrlBases) -> Self {
        self.urls = urls;
        self
    }
}
