//! Report directory layout and the atomic report writer.
//!
//! ```text
//! <output>/index.json
//! <output>/<branch>/report.json
//! <output>/<branch>/diffs/<emulator_version>/<suite>/<test>.<side>-diff.png
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::model::{ArtifactKey, ComparisonReport, ComparisonSide};

pub const REPORT_FILE: &str = "report.json";
pub const INDEX_FILE: &str = "index.json";
pub const DIFFS_DIR: &str = "diffs";

/// Directory name for a branch: `/` is not allowed in one path component.
pub fn branch_dir_name(branch: &str) -> String {
    branch.replace('/', "_")
}

/// Location of one diff artifact, relative to the branch directory.
///
/// Every path component comes from a real directory or file name, and the
/// depth is fixed per version, so distinct tuples never collide.
pub fn diff_artifact_relpath(version: &str, key: &ArtifactKey, side: ComparisonSide) -> String {
    format!(
        "{DIFFS_DIR}/{version}/{}/{}.{}-diff.png",
        key.suite,
        key.test_name,
        side.as_str()
    )
}

/// Writes a report into a staging directory and swaps it into place on
/// commit. Dropping an uncommitted writer discards the staging directory.
///
/// The previous report is moved aside to `.<branch>.previous` during the
/// swap and restored if the new one cannot be moved in.
#[derive(Debug)]
pub struct ReportWriter {
    output_root: PathBuf,
    final_dir: PathBuf,
    staging_dir: PathBuf,
    previous_dir: PathBuf,
    committed: bool,
}

impl ReportWriter {
    pub fn begin(output_root: &Path, branch: &str) -> Result<Self> {
        let dir_name = branch_dir_name(branch);
        let final_dir = output_root.join(&dir_name);
        let staging_dir = output_root.join(format!(".{dir_name}.staging"));
        let previous_dir = output_root.join(format!(".{dir_name}.previous"));

        if staging_dir.exists() {
            std::fs::remove_dir_all(&staging_dir)
                .map_err(|e| ReportError::output_write(&staging_dir, e))?;
        }
        std::fs::create_dir_all(&staging_dir)
            .map_err(|e| ReportError::output_write(&staging_dir, e))?;
        debug!(staging = %staging_dir.display(), "opened staging directory");

        Ok(Self {
            output_root: output_root.to_path_buf(),
            final_dir,
            staging_dir,
            previous_dir,
            committed: false,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Writes `report.json`, moves the staging directory over the previous
    /// report and refreshes the index. Returns the final report path.
    ///
    /// Once the new report is in place the commit succeeds; a failed index
    /// refresh is only logged.
    pub fn commit(mut self, report: &ComparisonReport) -> Result<PathBuf> {
        write_json(&self.staging_dir.join(REPORT_FILE), report)?;
        swap_into_place(&self.staging_dir, &self.final_dir, &self.previous_dir)?;
        self.committed = true;

        let report_path = self.final_dir.join(REPORT_FILE);
        info!(report = %report_path.display(), "report written");
        if let Err(e) = write_index(&self.output_root) {
            warn!(error = %e, "report published but index refresh failed");
        }
        Ok(report_path)
    }
}

/// Renames `staging` to `target`. An existing `target` is parked at
/// `previous` until the rename succeeds, and put back if it fails.
fn swap_into_place(staging: &Path, target: &Path, previous: &Path) -> Result<()> {
    if previous.exists() {
        std::fs::remove_dir_all(previous).map_err(|e| ReportError::output_write(previous, e))?;
    }
    let had_previous = target.exists();
    if had_previous {
        std::fs::rename(target, previous).map_err(|e| ReportError::output_write(target, e))?;
    }

    if let Err(e) = std::fs::rename(staging, target) {
        if had_previous {
            if let Err(restore) = std::fs::rename(previous, target) {
                warn!(
                    previous = %previous.display(),
                    error = %restore,
                    "failed to restore previous report"
                );
            }
        }
        return Err(ReportError::output_write(target, e));
    }

    if had_previous {
        if let Err(e) = std::fs::remove_dir_all(previous) {
            warn!(previous = %previous.display(), error = %e, "failed to remove previous report");
        }
    }
    Ok(())
}

impl Drop for ReportWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.staging_dir) {
            warn!(
                staging = %self.staging_dir.display(),
                error = %e,
                "failed to discard staging directory"
            );
        }
    }
}

/// Landing-page index: branch directory → report path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportIndex {
    pub reports: BTreeMap<String, String>,
}

/// Rescans `output_root` for branch reports and rewrites `index.json`.
pub fn write_index(output_root: &Path) -> Result<PathBuf> {
    let index = scan_index(output_root)?;
    let path = output_root.join(INDEX_FILE);
    write_json(&path, &index)?;
    debug!(index = %path.display(), reports = index.reports.len(), "index refreshed");
    Ok(path)
}

pub fn scan_index(output_root: &Path) -> Result<ReportIndex> {
    let entries =
        std::fs::read_dir(output_root).map_err(|e| ReportError::output_write(output_root, e))?;
    let mut index = ReportIndex::default();
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.path().join(REPORT_FILE).is_file() {
            continue;
        }
        index.reports.insert(name.clone(), format!("{name}/{REPORT_FILE}"));
    }
    Ok(index)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut text =
        serde_json::to_string_pretty(value).map_err(|e| ReportError::output_write(path, e))?;
    text.push('\n');
    std::fs::write(path, text).map_err(|e| ReportError::output_write(path, e))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn empty_report(branch: &str) -> ComparisonReport {
        ComparisonReport {
            branch: branch.to_string(),
            source_version: "src".to_string(),
            threshold: 0.0,
            versions: BTreeMap::new(),
        }
    }

    #[test]
    fn branch_names_flatten_slashes() {
        assert_eq!(branch_dir_name("pr/1234/fog"), "pr_1234_fog");
    }

    #[test]
    fn diff_paths_encode_every_component() {
        let key = ArtifactKey::new("shaders", "fog");
        assert_eq!(
            diff_artifact_relpath("xemu-0.8/linux", &key, ComparisonSide::Hardware),
            "diffs/xemu-0.8/linux/shaders/fog.hardware-diff.png"
        );
        assert_ne!(
            diff_artifact_relpath("v", &key, ComparisonSide::Emulator),
            diff_artifact_relpath("v", &key, ComparisonSide::Hardware)
        );
    }

    #[test]
    fn commit_replaces_previous_report_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("feature_x")).unwrap();
        std::fs::write(dir.path().join("feature_x/stale.png"), b"old").unwrap();

        let writer = ReportWriter::begin(dir.path(), "feature/x").unwrap();
        std::fs::write(writer.staging_dir().join("marker"), b"new").unwrap();
        let path = writer.commit(&empty_report("feature/x")).unwrap();

        assert_eq!(path, dir.path().join("feature_x/report.json"));
        assert!(!dir.path().join("feature_x/stale.png").exists());
        assert!(dir.path().join("feature_x/marker").exists());
        assert!(!dir.path().join(".feature_x.staging").exists());
        assert!(!dir.path().join(".feature_x.previous").exists());

        let index = scan_index(dir.path()).unwrap();
        assert_eq!(
            index.reports,
            BTreeMap::from([("feature_x".to_string(), "feature_x/report.json".to_string())])
        );
        assert!(dir.path().join(INDEX_FILE).is_file());
    }

    #[test]
    fn failed_swap_restores_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main");
        let previous = dir.path().join(".main.previous");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join(REPORT_FILE), b"old").unwrap();

        let missing_staging = dir.path().join(".main.staging");
        let err = swap_into_place(&missing_staging, &target, &previous).unwrap_err();

        assert_eq!(err.code(), "OUTPUT_WRITE_FAILED");
        assert_eq!(std::fs::read(target.join(REPORT_FILE)).unwrap(), b"old");
        assert!(!previous.exists());
    }

    #[test]
    fn index_failure_does_not_fail_commit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(INDEX_FILE)).unwrap();

        let writer = ReportWriter::begin(dir.path(), "main").unwrap();
        let path = writer.commit(&empty_report("main")).unwrap();

        assert!(path.is_file());
        assert!(dir.path().join(INDEX_FILE).is_dir());
    }

    #[test]
    fn dropped_writer_discards_staging() {
        let dir = tempfile::tempdir().unwrap();
        {
            let writer = ReportWriter::begin(dir.path(), "main").unwrap();
            assert!(writer.staging_dir().is_dir());
        }
        assert!(!dir.path().join(".main.staging").exists());
        assert!(!dir.path().join("main").exists());
    }
}
