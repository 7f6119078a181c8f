//! Artifact discovery.
//!
//! A run root is laid out as `<run>/<suite>/<test_name>.png`. Reference roots
//! can hold several runs; each run directory is marked by a `results.json`
//! file, the same marker the capture harness writes next to its output.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ReportError, Result};
use crate::model::{ArtifactKey, ArtifactLocation};

pub const RUN_MARKER: &str = "results.json";
const ARTIFACT_EXTENSION: &str = "png";
const DIFF_SUFFIX: &str = "-diff";

/// Which input an artifact set was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetRole {
    Source,
    EmulatorGolden,
    HardwareGolden,
}

impl fmt::Display for SetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::EmulatorGolden => "emulator-golden",
            Self::HardwareGolden => "hardware-golden",
        })
    }
}

/// One run directory found below a reference root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    /// `/`-joined path of the run relative to the root it was found under.
    pub version: String,
    pub path: PathBuf,
}

/// Read-only mapping of keys to artifact locations for one run.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub role: SetRole,
    pub version: String,
    pub root: PathBuf,
    artifacts: BTreeMap<ArtifactKey, ArtifactLocation>,
}

impl ArtifactSet {
    /// Scans `run_root` and builds the set. Unreadable entries are skipped.
    pub fn load(
        role: SetRole,
        version: impl Into<String>,
        run_root: &Path,
        url_base: Option<&str>,
    ) -> Self {
        let version = version.into();
        let artifacts = scan_run(run_root, url_base);
        debug!(
            %role,
            %version,
            root = %run_root.display(),
            count = artifacts.len(),
            "loaded artifact set"
        );
        Self {
            role,
            version,
            root: run_root.to_path_buf(),
            artifacts,
        }
    }

    pub fn empty(role: SetRole, version: impl Into<String>, root: &Path) -> Self {
        Self {
            role,
            version: version.into(),
            root: root.to_path_buf(),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArtifactKey> {
        self.artifacts.keys()
    }

    pub fn resolve(&self, key: &ArtifactKey) -> Option<&ArtifactLocation> {
        self.artifacts.get(key)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Lists every key under `root`. A missing root yields an empty set.
pub fn enumerate(root: &Path) -> BTreeSet<ArtifactKey> {
    scan_run(root, None).into_keys().collect()
}

/// Resolves one key under `root` to its artifact path.
pub fn resolve(root: &Path, key: &ArtifactKey) -> Option<PathBuf> {
    let direct = root
        .join(&key.suite)
        .join(format!("{}.{ARTIFACT_EXTENSION}", key.test_name));
    if direct.is_file() {
        return Some(direct);
    }
    scan_run(root, None).remove(key).map(|loc| loc.path)
}

/// Fails with `InputRootUnreadable` unless `root` is a listable directory.
pub fn ensure_readable(role: SetRole, root: &Path) -> Result<()> {
    std::fs::read_dir(root)
        .map(|_| ())
        .map_err(|source| ReportError::InputRootUnreadable {
            role,
            path: root.to_path_buf(),
            source,
        })
}

/// Finds run directories under `root`.
///
/// Discovery stops descending once a marker is found. When no marker exists
/// anywhere, the root itself is the only run.
pub fn discover_runs(root: &Path) -> Vec<RunDir> {
    let mut runs = Vec::new();
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
    loop {
        let entry = match walker.next() {
            None => break,
            Some(Ok(entry)) => entry,
            Some(Err(e)) => {
                warn!(
                    root = %root.display(),
                    error = %e,
                    "skipping unreadable entry during run discovery"
                );
                continue;
            }
        };
        if !entry.file_type().is_dir() || !entry.path().join(RUN_MARKER).is_file() {
            continue;
        }
        let version = relative_label(root, entry.path()).unwrap_or_else(|| root_label(root));
        runs.push(RunDir {
            version,
            path: entry.path().to_path_buf(),
        });
        walker.skip_current_dir();
    }

    if runs.is_empty() {
        runs.push(RunDir {
            version: root_label(root),
            path: root.to_path_buf(),
        });
    }
    runs
}

/// Label used when the root itself is the run: its directory name.
pub fn root_label(root: &Path) -> String {
    let named = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            std::fs::canonicalize(root)
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        });
    named.unwrap_or_else(|| "default".to_string())
}

fn relative_label(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn scan_run(run_root: &Path, url_base: Option<&str>) -> BTreeMap<ArtifactKey, ArtifactLocation> {
    let mut out = BTreeMap::new();
    for entry in WalkDir::new(run_root)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().and_then(|x| x.to_str()) != Some(ARTIFACT_EXTENSION) {
            continue;
        }
        let Some(test_name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if test_name.ends_with(DIFF_SUFFIX) {
            continue;
        }
        let Some(suite) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
        else {
            continue;
        };
        let Some(relative) = relative_label(run_root, path) else {
            continue;
        };

        let key = ArtifactKey::new(suite, test_name);
        if out.contains_key(&key) {
            warn!(%key, path = %path.display(), "duplicate artifact key; keeping the first match");
            continue;
        }
        let url = url_base.map(|base| join_url(base, &relative));
        out.insert(
            key,
            ArtifactLocation {
                path: path.to_path_buf(),
                relative,
                url,
            },
        );
    }
    out
}

pub(crate) fn join_url(base: &str, relative: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), relative.trim_start_matches('/'))
}
