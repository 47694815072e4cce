//! Checksum generation for album folders.
//!
//! A folder gets a manifest only if *every* audio file in it produced a
//! usable fingerprint.  One bad file (path too long, no embedded checksum,
//! unreadable stream) means no manifest at all for that folder; the other
//! folders of the batch carry on.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, instrument};
use walkdir::WalkDir;

use crate::manifest::{Manifest, ManifestError, WriteOutcome, MANIFEST_EXTENSION};
use crate::parallel::map_ordered;
use crate::report::BatchReport;
use crate::scan::{child_directories, has_any_extension, has_manifest, ScanError};
use crate::source::{FingerprintSource, SourceError};

/// Longest full path, in characters, that generation accepts.
pub const DEFAULT_MAX_PATH_LEN: usize = 260;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Path too long ({len} > {max} characters): {}", .path.display())]
    PathTooLong { path: PathBuf, len: usize, max: usize },
    #[error("{}: MD5 signature unset in the STREAMINFO", .0.display())]
    FingerprintUnset(PathBuf),
    #[error("{}: {source}", .path.display())]
    Source { path: PathBuf, source: SourceError },
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
    #[error("Error scanning {}: {source}", .path.display())]
    Walk { path: PathBuf, source: walkdir::Error },
    #[error(transparent)]
    Write(#[from] ManifestError),
}

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Extensions (no dot, any case) of the files that get fingerprints.
    pub extensions:         Vec<String>,
    pub manifest_extension: String,
    pub max_path_len:       usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            extensions:         vec!["flac".to_owned()],
            manifest_extension: MANIFEST_EXTENSION.to_owned(),
            max_path_len:       DEFAULT_MAX_PATH_LEN,
        }
    }
}

// ── Per-folder result ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderStatus {
    /// A manifest was already there; nothing was touched.
    Skipped,
    /// No audio files; nothing was written.
    Empty,
    Written { manifest: PathBuf, entries: usize },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderReport {
    pub folder: PathBuf,
    pub status: FolderStatus,
    pub errors: Vec<String>,
}

impl FolderReport {
    fn failed(folder: &Path, errors: &[GenerateError]) -> Self {
        let errors = errors
            .iter()
            .map(|e| format!("Error generating checksums for {}: {e}", folder.display()))
            .collect();
        Self { folder: folder.to_owned(), status: FolderStatus::Failed, errors }
    }

    pub fn to_batch(&self) -> BatchReport {
        let mut batch = BatchReport { attempted: 1, ..BatchReport::default() };
        let folder = self.folder.display();
        match &self.status {
            FolderStatus::Skipped => batch.record_pass(format!("ffp exists in: {folder}")),
            FolderStatus::Empty => batch.record_pass(format!("No checksums generated for: {folder}")),
            FolderStatus::Written { manifest, .. } => {
                batch.record_pass(format!("Created file: {}", manifest.display()))
            }
            FolderStatus::Failed => {
                for e in &self.errors {
                    batch.record_failure(e.clone());
                }
            }
        }
        batch
    }
}

/// Collect folder reports, in folder order, into one batch.
pub fn batch_of(folders: &[FolderReport]) -> BatchReport {
    folders.iter().map(FolderReport::to_batch).collect()
}

// ── Generator ────────────────────────────────────────────────────────────────

pub struct Generator<'a> {
    source:  &'a dyn FingerprintSource,
    options: GenerateOptions,
}

impl<'a> Generator<'a> {
    pub fn new(source: &'a dyn FingerprintSource, options: GenerateOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Build the in-memory manifest for `folder`.
    ///
    /// Returns `(Some(manifest), [])` when at least one file was fingerprinted
    /// and nothing went wrong, `(None, [])` when there was nothing to
    /// fingerprint, and `(None, errors)` otherwise.  Once one file has failed
    /// the source is not consulted again, but the remaining paths are still
    /// checked so every unaddressable file is reported.
    pub fn checksums(&self, folder: &Path) -> (Option<Manifest>, Vec<GenerateError>) {
        let mut manifest = match Manifest::for_folder(folder, &self.options.manifest_extension) {
            Ok(m) => m,
            Err(e) => return (None, vec![e.into()]),
        };
        let mut errors = Vec::new();

        for entry in WalkDir::new(folder).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source.path().unwrap_or(folder).to_owned();
                    errors.push(GenerateError::Walk { path, source });
                    continue;
                }
            };
            let path = entry.path();
            // A symlinked track is listed under the link's name.
            let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && path.is_file());
            if !is_file || !has_any_extension(path, &self.options.extensions) {
                continue;
            }

            let len = path.to_string_lossy().chars().count();
            if len > self.options.max_path_len {
                errors.push(GenerateError::PathTooLong {
                    path: path.to_owned(),
                    len,
                    max: self.options.max_path_len,
                });
                continue;
            }
            let Some(relative) = relative_key(folder, path) else {
                errors.push(GenerateError::NonUtf8Path(path.to_owned()));
                continue;
            };
            if !errors.is_empty() {
                continue;
            }

            match self.source.fingerprint(path) {
                Ok(fp) if fp.is_unset() => errors.push(GenerateError::FingerprintUnset(path.to_owned())),
                Ok(fp) => {
                    debug!(path = %relative, fingerprint = %fp, "fingerprinted");
                    manifest.insert(relative, fp);
                }
                Err(source) => errors.push(GenerateError::Source { path: path.to_owned(), source }),
            }
        }

        if !errors.is_empty() || manifest.is_empty() {
            (None, errors)
        } else {
            (Some(manifest), errors)
        }
    }

    /// Generate and persist the manifest of one folder, unless it has one.
    #[instrument(skip_all, fields(folder = %folder.display()))]
    pub fn generate_folder(&self, folder: &Path) -> FolderReport {
        let report = |status| FolderReport { folder: folder.to_owned(), status, errors: Vec::new() };

        match has_manifest(folder, &self.options.manifest_extension) {
            Ok(true) => {
                info!("ffp exists, skipping");
                return report(FolderStatus::Skipped);
            }
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "could not list folder");
                return FolderReport {
                    folder: folder.to_owned(),
                    status: FolderStatus::Failed,
                    errors: vec![format!("Error generating checksums for {}: {e}", folder.display())],
                };
            }
        }

        let (manifest, errors) = self.checksums(folder);
        if !errors.is_empty() {
            for e in &errors {
                error!(error = %e, "checksum generation failed");
            }
            return FolderReport::failed(folder, &errors);
        }
        let Some(manifest) = manifest else {
            info!("no audio files, nothing written");
            return report(FolderStatus::Empty);
        };

        match manifest.write() {
            Ok(WriteOutcome::Written(path)) => {
                info!(manifest = %path.display(), entries = manifest.len(), "created");
                report(FolderStatus::Written { manifest: path, entries: manifest.len() })
            }
            Ok(WriteOutcome::SkippedEmpty) => report(FolderStatus::Empty),
            // Lost a race with another writer: the folder has a manifest now.
            Err(ManifestError::Exists(_)) => report(FolderStatus::Skipped),
            Err(e) => {
                error!(error = %e, "could not write manifest");
                FolderReport::failed(folder, &[GenerateError::Write(e)])
            }
        }
    }

    /// Generate manifests for every immediate subfolder of `root`.
    ///
    /// Fails only if `root` cannot be listed; per-folder failures are in the
    /// returned reports, sorted by folder.
    pub fn generate_tree(&self, root: &Path) -> Result<Vec<FolderReport>, ScanError> {
        let folders = child_directories(root)?;
        info!(root = %root.display(), folders = folders.len(), "generating checksums");
        Ok(map_ordered(&folders, |folder| self.generate_folder(folder)))
    }
}

/// `path` relative to `folder`, components joined with `/`.  `None` if any
/// component is not valid UTF-8.
fn relative_key(folder: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(folder).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str()?);
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::source::SourceKind;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Counting {
        calls: AtomicUsize,
        value: Fingerprint,
    }

    impl FingerprintSource for Counting {
        fn kind(&self) -> SourceKind { SourceKind::StreamInfo }
        fn fingerprint(&self, _: &Path) -> Result<Fingerprint, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value)
        }
    }

    fn counting(value: Fingerprint) -> Counting {
        Counting { calls: AtomicUsize::new(0), value }
    }

    #[test]
    fn relative_keys_use_forward_slashes() {
        let folder = Path::new("/music/Album");
        assert_eq!(
            relative_key(folder, Path::new("/music/Album/CD1/01.flac")).as_deref(),
            Some("CD1/01.flac")
        );
        assert_eq!(relative_key(folder, Path::new("/elsewhere/01.flac")), None);
    }

    #[test]
    fn nested_files_and_other_extensions() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Album");
        fs::create_dir_all(album.join("CD2")).unwrap();
        fs::write(album.join("01.FLAC"), b"x").unwrap();
        fs::write(album.join("CD2").join("01.flac"), b"x").unwrap();
        fs::write(album.join("cover.jpg"), b"x").unwrap();

        let src = counting(Fingerprint::from_bytes([7; 16]));
        let gen = Generator::new(&src, GenerateOptions::default());
        let (manifest, errors) = gen.checksums(&album);
        assert!(errors.is_empty());
        let manifest = manifest.unwrap();
        assert_eq!(manifest.name(), "Album.ffp");
        assert_eq!(manifest.entries().keys().collect::<Vec<_>>(), vec!["01.FLAC", "CD2/01.flac"]);
    }

    #[test]
    fn first_failure_stops_fingerprinting() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Album");
        fs::create_dir(&album).unwrap();
        for name in ["a.flac", "b.flac", "c.flac"] {
            fs::write(album.join(name), b"x").unwrap();
        }
        let src = counting(Fingerprint::UNSET);
        let gen = Generator::new(&src, GenerateOptions::default());
        let (manifest, errors) = gen.checksums(&album);
        assert!(manifest.is_none());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], GenerateError::FingerprintUnset(_)));
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_tracks_are_included() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Album");
        fs::create_dir(&album).unwrap();
        fs::write(album.join("01.flac"), b"x").unwrap();
        let target = dir.path().join("elsewhere.flac");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, album.join("02.flac")).unwrap();

        let src = counting(Fingerprint::from_bytes([7; 16]));
        let gen = Generator::new(&src, GenerateOptions::default());
        let report = gen.generate_folder(&album);
        assert_eq!(
            report.status,
            FolderStatus::Written { manifest: album.join("Album.ffp"), entries: 2 }
        );
        let m = Manifest::read(album.join("Album.ffp")).unwrap();
        assert_eq!(m.entries().keys().collect::<Vec<_>>(), vec!["01.flac", "02.flac"]);
    }

    #[test]
    fn skipped_and_written_batch_lines() {
        let skipped = FolderReport { folder: "/m/A".into(), status: FolderStatus::Skipped, errors: vec![] };
        let written = FolderReport {
            folder: "/m/B".into(),
            status: FolderStatus::Written { manifest: "/m/B/B.ffp".into(), entries: 3 },
            errors: vec![],
        };
        let batch = batch_of(&[skipped, written]);
        assert_eq!(batch.attempted, 2);
        assert_eq!(batch.results, vec!["ffp exists in: /m/A", "Created file: /m/B/B.ffp"]);
        assert!(batch.is_clean());
    }
}
