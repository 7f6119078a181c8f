//! Human-curated known-issue annotations.
//!
//! File format: `{ "<suite>": { "<test_name>": ["issue", ...] } }`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::model::ArtifactKey;

/// Read-only side table injected into classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownIssues {
    by_suite: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl KnownIssues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::KnownIssuesUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ReportError::KnownIssuesUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Annotations for `key`, in file order. Empty when none apply.
    pub fn lookup(&self, key: &ArtifactKey) -> &[String] {
        self.by_suite
            .get(&key.suite)
            .and_then(|tests| tests.get(&key.test_name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
