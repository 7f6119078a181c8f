//! Visual diff reports for emulator frame-capture test runs.
//!
//! A source run is compared against emulator golden runs and a hardware
//! golden set. The output is a JSON report grouped by emulator version and
//! suite, plus one heat-map PNG per computed diff.

pub mod align;
pub mod assemble;
pub mod classify;
pub mod config;
pub mod differ;
pub mod error;
pub mod known_issues;
pub mod locator;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod protocol;

pub use classify::{ComparisonOutcome, Threshold, classify};
pub use config::{PipelineConfig, PipelineInputs, UrlBases};
pub use error::{ReportError, Result};
pub use model::{ArtifactKey, Classification, ComparisonReport, TestResult, VersionReport};
pub use pipeline::{RunSummary, run};
