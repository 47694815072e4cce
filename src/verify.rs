//! Concurrent verification of fingerprint manifests.
//!
//! Every entry is checked two ways, independently:
//!
//! 1. **Embedded checksum**: the [`FingerprintSource`] re-reads the file's
//!    fingerprint.  An all-zero value means there is nothing to compare.
//! 2. **Decode probe**: the [`DecodeProbe`] decodes the whole file.
//!
//! Both prongs always run.  The recorded fingerprint is compared with the
//! fresh one only when neither prong failed:
//!
//! | embedded          | probe | outcome                 |
//! |-------------------|-------|-------------------------|
//! | any               | fail  | `ProbeFailed`           |
//! | read error        | ok    | `ReadError`             |
//! | unset             | ok    | `FingerprintUnset`      |
//! | ≠ recorded        | ok    | `FingerprintMismatch`   |
//! | = recorded        | ok    | `Passed`                |
//!
//! A `ProbeFailed` outcome still carries the embedded-checksum problem, if
//! there was one, so neither failure hides the other.
//!
//! Verification is read-only: the manifest is borrowed immutably and its
//! file is never touched.  Entries of one manifest are checked in parallel;
//! results are returned sorted by entry path.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::fingerprint::Fingerprint;
use crate::manifest::Manifest;
use crate::parallel::map_ordered;
use crate::probe::{DecodeProbe, ProbeError};
use crate::report::BatchReport;
use crate::scan::{find_manifests, ScanError};
use crate::source::{FingerprintSource, SourceError};

const UNSET_DETAIL: &str = "MD5 signature unset in the STREAMINFO";

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    FingerprintUnset,
    FingerprintMismatch { actual: Fingerprint },
    ProbeFailed { detail: String, fingerprint_issue: Option<String> },
    ReadError { detail: String },
}

impl Outcome {
    /// Combine the two independent checks into one verdict.
    pub fn classify(
        recorded: &Fingerprint,
        embedded: Result<Fingerprint, SourceError>,
        probe:    Result<(), ProbeError>,
    ) -> Outcome {
        match (embedded, probe) {
            (embedded, Err(p)) => Outcome::ProbeFailed {
                detail: p.to_string(),
                fingerprint_issue: match embedded {
                    Err(e)                    => Some(e.to_string()),
                    Ok(fp) if fp.is_unset()   => Some(UNSET_DETAIL.to_owned()),
                    Ok(_)                     => None,
                },
            },
            (Err(e), Ok(()))                  => Outcome::ReadError { detail: e.to_string() },
            (Ok(fp), Ok(())) if fp.is_unset() => Outcome::FingerprintUnset,
            (Ok(fp), Ok(())) if fp == *recorded => Outcome::Passed,
            (Ok(fp), Ok(()))                  => Outcome::FingerprintMismatch { actual: fp },
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

// ── EntryReport ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    /// Path relative to the manifest's directory.
    pub path:     String,
    pub recorded: Fingerprint,
    pub outcome:  Outcome,
}

impl EntryReport {
    pub fn is_passed(&self) -> bool {
        self.outcome.is_passed()
    }

    /// Self-contained result line; `manifest` identifies the manifest file.
    pub fn message(&self, manifest: &Path) -> String {
        let m = manifest.display();
        let p = &self.path;
        let r = &self.recorded;
        match &self.outcome {
            Outcome::Passed => format!("{p}:{r} passed."),
            Outcome::FingerprintUnset => format!(
                "Error in file: {m}. Path: {p} cannot check MD5 signature since it was unset in the STREAMINFO"
            ),
            Outcome::FingerprintMismatch { actual } => format!(
                "Error in file: {m}. Path: {p}:{r} verified, but does not match signature {actual}."
            ),
            Outcome::ProbeFailed { detail, fingerprint_issue: None } => {
                format!("Error verifying file: {m}. Path: {p}: {detail}")
            }
            Outcome::ProbeFailed { detail, fingerprint_issue: Some(issue) } => {
                format!("Error verifying file: {m}. Path: {p}: {detail} (embedded checksum: {issue})")
            }
            Outcome::ReadError { detail } => format!("Error reading file: {m}. Path: {p}: {detail}"),
        }
    }
}

// ── ManifestReport ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestReport {
    pub manifest:   PathBuf,
    /// Set when the manifest could not be loaded; `entries` is then empty.
    pub load_error: Option<String>,
    pub entries:    Vec<EntryReport>,
}

impl ManifestReport {
    pub fn passed(&self) -> usize {
        self.entries.iter().filter(|e| e.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.passed()
    }

    pub fn is_clean(&self) -> bool {
        self.load_error.is_none() && self.failed() == 0
    }

    /// Flatten into result/error lines.
    pub fn to_batch(&self) -> BatchReport {
        let mut batch = BatchReport { attempted: 1, ..BatchReport::default() };
        if let Some(e) = &self.load_error {
            batch.record_failure(e.clone());
        }
        for entry in &self.entries {
            let line = entry.message(&self.manifest);
            if entry.is_passed() {
                batch.record_pass(line);
            } else {
                batch.record_failure(line);
            }
        }
        batch
    }
}

// ── TreeReport ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeReport {
    /// One report per manifest found, sorted by manifest path.
    pub manifests:   Vec<ManifestReport>,
    /// Subtrees that could not be walked.
    pub scan_errors: Vec<String>,
}

impl TreeReport {
    /// Per-manifest, per-entry outcomes as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_batch(&self) -> BatchReport {
        let mut batch: BatchReport = self.manifests.iter().map(ManifestReport::to_batch).collect();
        for e in &self.scan_errors {
            batch.record_failure(e.clone());
        }
        batch
    }
}

// ── Verifier ─────────────────────────────────────────────────────────────────

pub struct Verifier<'a> {
    source: &'a dyn FingerprintSource,
    probe:  &'a dyn DecodeProbe,
}

impl<'a> Verifier<'a> {
    pub fn new(source: &'a dyn FingerprintSource, probe: &'a dyn DecodeProbe) -> Self {
        Self { source, probe }
    }

    /// Check one entry.  Never fails: every problem becomes the outcome.
    pub fn check_entry(&self, manifest: &Manifest, relative: &str, recorded: &Fingerprint) -> EntryReport {
        let file = manifest.resolve(relative);
        let outcome = match fs::metadata(&file) {
            Err(e) => Outcome::ReadError { detail: e.to_string() },
            Ok(meta) if !meta.is_file() => Outcome::ReadError { detail: "not a regular file".to_owned() },
            Ok(_) => {
                let embedded = self.source.fingerprint(&file);
                let probe    = self.probe.probe(&file);
                Outcome::classify(recorded, embedded, probe)
            }
        };

        if outcome.is_passed() {
            debug!(manifest = %manifest.path().display(), path = relative, "passed");
        } else {
            error!(manifest = %manifest.path().display(), path = relative, ?outcome, "verification failed");
        }
        EntryReport { path: relative.to_owned(), recorded: *recorded, outcome }
    }

    /// Check every entry of a loaded manifest.
    #[instrument(skip_all, fields(manifest = %manifest.path().display(), entries = manifest.len()))]
    pub fn verify(&self, manifest: &Manifest) -> ManifestReport {
        if manifest.is_empty() {
            warn!("manifest has no entries");
        }
        let work: Vec<(&String, &Fingerprint)> = manifest.entries().iter().collect();
        let entries = map_ordered(&work, |(path, recorded)| self.check_entry(manifest, path, recorded));

        let report = ManifestReport { manifest: manifest.path(), load_error: None, entries };
        info!(passed = report.passed(), failed = report.failed(), "verified");
        report
    }

    /// Load and verify the manifest at `path`.  A manifest that cannot be
    /// read or parsed yields a report with `load_error` set.
    pub fn verify_file(&self, path: &Path) -> ManifestReport {
        match Manifest::read(path) {
            Ok(manifest) => self.verify(&manifest),
            Err(e) => {
                error!(manifest = %path.display(), error = %e, "could not load manifest");
                ManifestReport { manifest: path.to_owned(), load_error: Some(e.to_string()), entries: Vec::new() }
            }
        }
    }

    /// Verify every manifest found anywhere under `root`.
    ///
    /// Fails only if `root` itself cannot be scanned; any later failure is
    /// captured in the report.
    pub fn verify_tree(&self, root: &Path, extension: &str) -> Result<TreeReport, ScanError> {
        info!(root = %root.display(), "searching for *.{extension} files and verifying signatures");
        let (found, scan_errors) = find_manifests(root, extension)?;
        if found.is_empty() {
            info!(root = %root.display(), "no fingerprints to verify");
        }
        let manifests = map_ordered(&found, |path| self.verify_file(path));
        Ok(TreeReport { manifests, scan_errors })
    }
}
