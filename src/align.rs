//! Alignment engine.
//!
//! Builds the union of keys across the source run and both reference sets,
//! then diffs and classifies every key on the worker pool. Per-key failures
//! degrade that key's classification. Only output write failures abort.

use std::collections::BTreeSet;
use std::path::PathBuf;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::classify::{ComparisonOutcome, Threshold, classify, overall};
use crate::differ;
use crate::error::{ReportError, Result};
use crate::known_issues::KnownIssues;
use crate::locator::{ArtifactSet, join_url};
use crate::model::{
    ArtifactKey, ArtifactLocation, Classification, ComparisonSide, DiffRecord, TestResult,
};
use crate::output::diff_artifact_relpath;
use crate::pool;

/// Every key visible in any of `sets`, in report order.
pub fn union_keys(sets: &[&ArtifactSet]) -> BTreeSet<ArtifactKey> {
    sets.iter().flat_map(|set| set.keys().cloned()).collect()
}

/// One unit of work: everything needed to process a single key.
#[derive(Debug, Clone)]
struct KeyJob {
    key: ArtifactKey,
    source: Option<ArtifactLocation>,
    emulator: Option<ArtifactLocation>,
    hardware: Option<ArtifactLocation>,
    known_issues: Vec<String>,
}

/// Per-run settings shared by every key.
#[derive(Debug, Clone)]
pub struct Aligner<'a> {
    pub threshold: Threshold,
    pub known_issues: &'a KnownIssues,
    /// Branch directory diff artifacts are written under.
    pub report_dir: PathBuf,
    /// Public URL of the branch directory, if published.
    pub report_url: Option<String>,
    pub workers: usize,
}

impl Aligner<'_> {
    /// Aligns the three sets for the version carried by `emulator`.
    ///
    /// Results are sorted by suite, then test name.
    pub fn align(
        &self,
        source: &ArtifactSet,
        emulator: &ArtifactSet,
        hardware: &ArtifactSet,
    ) -> Result<Vec<TestResult>> {
        let keys = union_keys(&[source, emulator, hardware]);
        let jobs: Vec<KeyJob> = keys
            .into_iter()
            .map(|key| KeyJob {
                source: source.resolve(&key).cloned(),
                emulator: emulator.resolve(&key).cloned(),
                hardware: hardware.resolve(&key).cloned(),
                known_issues: self.known_issues.lookup(&key).to_vec(),
                key,
            })
            .collect();

        let version = emulator.version.as_str();
        debug!(%version, keys = jobs.len(), workers = self.workers, "aligning");

        let outcomes = pool::map_unordered(jobs, self.workers, |job| self.process(version, job));
        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            results.push(outcome?);
        }
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    fn process(&self, version: &str, job: KeyJob) -> Result<TestResult> {
        let KeyJob {
            key,
            source,
            emulator,
            hardware,
            known_issues,
        } = job;

        let mut emulator_side = SideResult::missing();
        let mut hardware_side = SideResult::missing();

        match &source {
            None => {
                debug!(%key, %version, "key missing from source run");
            }
            Some(src) if emulator.is_some() || hardware.is_some() => {
                match differ::load_rgba8(&src.path) {
                    Ok(src_img) => {
                        let ctx = KeyContext {
                            version,
                            key: &key,
                            source: src,
                            source_img: &src_img,
                            known_issues: &known_issues,
                        };
                        if let Some(reference) = &emulator {
                            emulator_side =
                                self.compare(&ctx, ComparisonSide::Emulator, reference)?;
                        }
                        if let Some(reference) = &hardware {
                            hardware_side =
                                self.compare(&ctx, ComparisonSide::Hardware, reference)?;
                        }
                    }
                    Err(e) => {
                        warn!(
                            %key,
                            %version,
                            error = %e,
                            "source artifact unreadable; treating references as missing"
                        );
                    }
                }
            }
            Some(_) => {}
        }

        let status = overall(
            source.is_some(),
            &[emulator_side.status, hardware_side.status],
        );
        let has_diff = [&emulator_side.record, &hardware_side.record]
            .into_iter()
            .flatten()
            .any(|r| r.score.is_some_and(|score| score > 0.0));

        Ok(TestResult {
            key,
            source,
            emulator_golden: emulator,
            hardware_golden: hardware,
            emulator_diff: emulator_side.record,
            hardware_diff: hardware_side.record,
            emulator_status: emulator_side.status,
            hardware_status: hardware_side.status,
            status,
            has_diff,
            known_issues,
        })
    }

    fn compare(
        &self,
        ctx: &KeyContext<'_>,
        side: ComparisonSide,
        reference: &ArtifactLocation,
    ) -> Result<SideResult> {
        let ref_img = match differ::load_rgba8(&reference.path) {
            Ok(img) => img,
            Err(e) => {
                warn!(
                    key = %ctx.key,
                    version = ctx.version,
                    side = side.as_str(),
                    error = %e,
                    "reference unreadable"
                );
                return Ok(SideResult::missing());
            }
        };

        let record = match differ::diff(ctx.source_img, &ref_img) {
            Ok(diff) => {
                let rel = diff_artifact_relpath(ctx.version, ctx.key, side);
                differ::persist(&diff, &self.report_dir.join(&rel))?;
                let classification = classify(
                    ComparisonOutcome::Scored(diff.score),
                    self.threshold,
                    ctx.known_issues,
                );
                debug!(
                    key = %ctx.key,
                    side = side.as_str(),
                    score = diff.score,
                    %classification,
                    "compared"
                );
                DiffRecord {
                    side,
                    source: ctx.source.clone(),
                    reference: reference.clone(),
                    diff_url: self.report_url.as_deref().map(|base| join_url(base, &rel)),
                    diff_artifact: Some(rel),
                    score: Some(diff.score),
                    stats: Some(diff.stats),
                    classification,
                    detail: None,
                }
            }
            Err(e @ ReportError::DimensionMismatch { .. }) => {
                warn!(
                    key = %ctx.key,
                    version = ctx.version,
                    side = side.as_str(),
                    error = %e,
                    "incomparable artifacts"
                );
                DiffRecord {
                    side,
                    source: ctx.source.clone(),
                    reference: reference.clone(),
                    diff_artifact: None,
                    diff_url: None,
                    score: None,
                    stats: None,
                    classification: classify(
                        ComparisonOutcome::Incomparable,
                        self.threshold,
                        ctx.known_issues,
                    ),
                    detail: Some(e.to_string()),
                }
            }
            Err(e) => return Err(e),
        };

        Ok(SideResult {
            status: record.classification,
            record: Some(record),
        })
    }
}

struct KeyContext<'a> {
    version: &'a str,
    key: &'a ArtifactKey,
    source: &'a ArtifactLocation,
    source_img: &'a RgbaImage,
    known_issues: &'a [String],
}

struct SideResult {
    status: Classification,
    record: Option<DiffRecord>,
}

impl SideResult {
    fn missing() -> Self {
        Self {
            status: Classification::MissingReference,
            record: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use image::Rgba;

    use super::*;
    use crate::locator::SetRole;

    fn write_png(root: &Path, suite: &str, test: &str, img: &RgbaImage) {
        let path = root.join(suite).join(format!("{test}.png"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        img.save(&path).unwrap();
    }

    fn solid(size: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba(color))
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        source: PathBuf,
        emulator: PathBuf,
        hardware: PathBuf,
        out: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let emulator = dir.path().join("emulator");
        let hardware = dir.path().join("hardware");
        let out = dir.path().join("out");
        for d in [&source, &emulator, &hardware, &out] {
            std::fs::create_dir_all(d).unwrap();
        }
        Fixture {
            _dir: dir,
            source,
            emulator,
            hardware,
            out,
        }
    }

    fn aligner<'a>(issues: &'a KnownIssues, out: &Path) -> Aligner<'a> {
        Aligner {
            threshold: Threshold::new(0.1).unwrap(),
            known_issues: issues,
            report_dir: out.to_path_buf(),
            report_url: Some("https://site/main".to_string()),
            workers: 3,
        }
    }

    fn sets(f: &Fixture) -> (ArtifactSet, ArtifactSet, ArtifactSet) {
        (
            ArtifactSet::load(SetRole::Source, "src", &f.source, None),
            ArtifactSet::load(SetRole::EmulatorGolden, "v1", &f.emulator, None),
            ArtifactSet::load(SetRole::HardwareGolden, "hw", &f.hardware, None),
        )
    }

    #[test]
    fn union_covers_keys_from_every_side() {
        let f = fixture();
        write_png(&f.source, "a", "only_source", &solid(2, [0; 4]));
        write_png(&f.emulator, "b", "only_emulator", &solid(2, [0; 4]));
        write_png(&f.hardware, "c", "only_hardware", &solid(2, [0; 4]));

        let (s, e, h) = sets(&f);
        let issues = KnownIssues::new();
        let results = aligner(&issues, &f.out).align(&s, &e, &h).unwrap();

        let keys: Vec<String> = results.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, ["a/only_source", "b/only_emulator", "c/only_hardware"]);
        assert!(results.iter().all(|r| r.status == Classification::MissingReference));
        assert!(results.iter().all(|r| r.emulator_diff.is_none() && r.hardware_diff.is_none()));
    }

    #[test]
    fn compares_both_sides_and_writes_artifacts() {
        let f = fixture();
        let base = solid(4, [10, 10, 10, 255]);
        let far = solid(4, [250, 250, 250, 255]);
        write_png(&f.source, "basic", "clear", &base);
        write_png(&f.emulator, "basic", "clear", &base);
        write_png(&f.hardware, "basic", "clear", &far);

        let (s, e, h) = sets(&f);
        let issues = KnownIssues::new();
        let results = aligner(&issues, &f.out).align(&s, &e, &h).unwrap();
        let r = &results[0];

        assert_eq!(r.emulator_status, Classification::Match);
        assert_eq!(r.hardware_status, Classification::Regression);
        assert_eq!(r.status, Classification::Regression);
        assert!(r.has_diff);
        assert_eq!(r.emulator_diff.as_ref().unwrap().score, Some(0.0));

        let hw = r.hardware_diff.as_ref().unwrap();
        let rel = hw.diff_artifact.as_deref().unwrap();
        assert_eq!(rel, "diffs/v1/basic/clear.hardware-diff.png");
        assert!(f.out.join(rel).is_file());
        assert_eq!(
            hw.diff_url.as_deref(),
            Some("https://site/main/diffs/v1/basic/clear.hardware-diff.png")
        );
    }

    #[test]
    fn undecodable_reference_counts_as_missing() {
        let f = fixture();
        write_png(&f.source, "basic", "clear", &solid(2, [0; 4]));
        std::fs::create_dir_all(f.emulator.join("basic")).unwrap();
        std::fs::write(f.emulator.join("basic/clear.png"), b"garbage").unwrap();

        let (s, e, h) = sets(&f);
        let issues = KnownIssues::new();
        let results = aligner(&issues, &f.out).align(&s, &e, &h).unwrap();

        assert_eq!(results[0].emulator_status, Classification::MissingReference);
        assert!(results[0].emulator_diff.is_none());
        assert!(results[0].emulator_golden.is_some());
    }

    #[test]
    fn identical_artifacts_have_no_diff() {
        let f = fixture();
        let base = solid(4, [40, 80, 120, 255]);
        write_png(&f.source, "basic", "clear", &base);
        write_png(&f.emulator, "basic", "clear", &base);
        write_png(&f.hardware, "basic", "clear", &base);

        let (s, e, h) = sets(&f);
        let issues = KnownIssues::new();
        let results = aligner(&issues, &f.out).align(&s, &e, &h).unwrap();

        assert_eq!(results[0].status, Classification::Match);
        assert!(!results[0].has_diff);
    }
}
