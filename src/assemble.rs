use std::collections::BTreeMap;

use crate::classify::Threshold;
use crate::model::{ComparisonReport, TestResult, VersionReport};

/// Groups one version's flat result list by suite.
///
/// Suites come out in map order; tests are stably sorted by name within each
/// suite, so an already-sorted input keeps its order.
pub fn group_by_suite(results: Vec<TestResult>) -> VersionReport {
    let mut report = VersionReport::default();
    for result in results {
        report.totals.record(result.status);
        report
            .suites
            .entry(result.key.suite.clone())
            .or_default()
            .push(result);
    }
    for tests in report.suites.values_mut() {
        tests.sort_by(|a, b| a.key.test_name.cmp(&b.key.test_name));
    }
    report
}

/// Builds the root report object from per-version alignment results.
pub fn assemble(
    branch: &str,
    source_version: &str,
    threshold: Threshold,
    per_version: BTreeMap<String, Vec<TestResult>>,
) -> ComparisonReport {
    ComparisonReport {
        branch: branch.to_string(),
        source_version: source_version.to_string(),
        threshold: threshold.value(),
        versions: per_version
            .into_iter()
            .map(|(version, results)| (version, group_by_suite(results)))
            .collect(),
    }
}
