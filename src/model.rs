//! Report data model.
//!
//! Every value here is built once during a report run and never mutated
//! afterwards. The serialized form is what the site templates consume.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Join key shared by all three artifact sets.
///
/// Ordering is suite first, then test name, which is the report ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub suite: String,
    pub test_name: String,
}

impl ArtifactKey {
    pub fn new(suite: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            test_name: test_name.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.suite, self.test_name)
    }
}

/// Where one artifact lives on disk and, optionally, where it is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub path: PathBuf,
    /// Path below the run root, always `/`-separated.
    pub relative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Which reference a comparison was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonSide {
    Emulator,
    Hardware,
}

impl ComparisonSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emulator => "emulator",
            Self::Hardware => "hardware",
        }
    }
}

/// Outcome label for one comparison or one whole test.
///
/// Variant order is severity order: the overall status of a test is the
/// maximum of its per-side statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Match,
    MissingReference,
    KnownIssue,
    Incomparable,
    Regression,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Match,
        Classification::MissingReference,
        Classification::KnownIssue,
        Classification::Incomparable,
        Classification::Regression,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::MissingReference => "missing_reference",
            Self::KnownIssue => "known_issue",
            Self::Incomparable => "incomparable",
            Self::Regression => "regression",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel statistics collected while diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffStats {
    pub total_pixels: u64,
    pub different_pixels: u64,
    pub max_channel_delta: u8,
}

/// Result of comparing the source artifact against one reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub side: ComparisonSide,
    pub source: ArtifactLocation,
    pub reference: ArtifactLocation,
    /// Diff image path relative to the report directory. Absent when the
    /// pair could not be diffed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DiffStats>,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aligned outcome for one key within one emulator version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub key: ArtifactKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ArtifactLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator_golden: Option<ArtifactLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_golden: Option<ArtifactLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator_diff: Option<DiffRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_diff: Option<DiffRecord>,
    pub emulator_status: Classification,
    pub hardware_status: Classification,
    pub status: Classification,
    pub has_diff: bool,
    #[serde(default)]
    pub known_issues: Vec<String>,
}

impl TestResult {
    pub fn diff(&self, side: ComparisonSide) -> Option<&DiffRecord> {
        match side {
            ComparisonSide::Emulator => self.emulator_diff.as_ref(),
            ComparisonSide::Hardware => self.hardware_diff.as_ref(),
        }
    }
}

/// Count of tests per overall classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusTotals {
    pub total: usize,
    #[serde(rename = "match")]
    pub matched: usize,
    pub regression: usize,
    pub known_issue: usize,
    pub missing_reference: usize,
    pub incomparable: usize,
}

impl StatusTotals {
    pub fn record(&mut self, status: Classification) {
        self.total += 1;
        match status {
            Classification::Match => self.matched += 1,
            Classification::Regression => self.regression += 1,
            Classification::KnownIssue => self.known_issue += 1,
            Classification::MissingReference => self.missing_reference += 1,
            Classification::Incomparable => self.incomparable += 1,
        }
    }

    pub fn count(&self, status: Classification) -> usize {
        match status {
            Classification::Match => self.matched,
            Classification::Regression => self.regression,
            Classification::KnownIssue => self.known_issue,
            Classification::MissingReference => self.missing_reference,
            Classification::Incomparable => self.incomparable,
        }
    }
}

/// Suite-grouped results for one emulator version.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VersionReport {
    pub suites: BTreeMap<String, Vec<TestResult>>,
    pub totals: StatusTotals,
}

/// Root object handed to the site renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub branch: String,
    pub source_version: String,
    pub threshold: f64,
    pub versions: BTreeMap<String, VersionReport>,
}

impl ComparisonReport {
    pub fn result(&self, version: &str, key: &ArtifactKey) -> Option<&TestResult> {
        self.versions
            .get(version)?
            .suites
            .get(&key.suite)?
            .iter()
            .find(|r| r.key.test_name == key.test_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_by_suite_then_test() {
        let mut keys = vec![
            ArtifactKey::new("texture", "a"),
            ArtifactKey::new("basic", "z"),
            ArtifactKey::new("basic", "clear_color"),
        ];
        keys.sort();
        let names: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["basic/clear_color", "basic/z", "texture/a"]);
    }

    #[test]
    fn severity_order_puts_regression_last() {
        assert!(Classification::Match < Classification::MissingReference);
        assert!(Classification::KnownIssue < Classification::Incomparable);
        assert_eq!(
            Classification::ALL.iter().copied().max(),
            Some(Classification::Regression)
        );
    }

    #[test]
    fn classification_serializes_snake_case() {
        let text = serde_json::to_string(&Classification::MissingReference).unwrap();
        assert_eq!(text, "\"missing_reference\"");
    }
}
