use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::model::Classification;

/// Largest score still treated as a match. Always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    pub const EXACT: Threshold = Threshold(0.0);

    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ReportError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ReportError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> f64 {
        t.0
    }
}

/// What happened when one side of a key was compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonOutcome {
    Scored(f64),
    MissingReference,
    Incomparable,
}

/// Labels one comparison. Pure: depends only on its arguments.
pub fn classify(
    outcome: ComparisonOutcome,
    threshold: Threshold,
    known_issues: &[String],
) -> Classification {
    match outcome {
        ComparisonOutcome::MissingReference => Classification::MissingReference,
        ComparisonOutcome::Incomparable => Classification::Incomparable,
        ComparisonOutcome::Scored(score) if score <= threshold.value() => Classification::Match,
        ComparisonOutcome::Scored(_) if !known_issues.is_empty() => Classification::KnownIssue,
        ComparisonOutcome::Scored(_) => Classification::Regression,
    }
}

/// Overall status of a test from its per-side statuses.
pub fn overall(has_source: bool, sides: &[Classification]) -> Classification {
    if !has_source {
        return Classification::MissingReference;
    }
    sides
        .iter()
        .copied()
        .max()
        .unwrap_or(Classification::MissingReference)
}
