//! Folder discovery: album folders under a root, manifests anywhere below it.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("Error listing {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Fail early if `root` cannot be scanned at all.
pub fn check_root(root: &Path) -> Result<(), ScanError> {
    if !root.exists() {
        return Err(ScanError::PathNotFound(root.to_owned()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_owned()));
    }
    Ok(())
}

/// Immediate subdirectories of `root`, sorted.  Each one is an album.
pub fn child_directories(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    check_root(root)?;
    let io_err = |source| ScanError::Io { path: root.to_owned(), source };
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Case-insensitive extension test.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

pub fn has_any_extension(path: &Path, extensions: &[String]) -> bool {
    extensions.iter().any(|e| has_extension(path, e))
}

/// Whether `folder` directly contains any file with the manifest extension,
/// whatever its name.
pub fn has_manifest(folder: &Path, extension: &str) -> Result<bool, ScanError> {
    let io_err = |source| ScanError::Io { path: folder.to_owned(), source };
    for entry in fs::read_dir(folder).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if has_extension(&path, extension) && path.is_file() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every manifest file under `root`, recursively, sorted by path.
///
/// Unreadable subtrees do not stop the walk; they are returned as messages
/// alongside the manifests found elsewhere.
pub fn find_manifests(root: &Path, extension: &str) -> Result<(Vec<PathBuf>, Vec<String>), ScanError> {
    check_root(root)?;
    let mut found = Vec::new();
    let mut problems = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && has_extension(entry.path(), extension) {
                    found.push(entry.into_path());
                }
            }
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                let at = e.path().unwrap_or(root).display().to_string();
                problems.push(format!("Error scanning {at}: {e}"));
            }
        }
    }
    found.sort();
    Ok((found, problems))
}

/// Tidy a root directory argument: surrounding single quotes (left by some
/// shell wrappers) and trailing separators are removed.
pub fn clean_root_arg(raw: &str) -> PathBuf {
    let trimmed = raw.trim().trim_matches('\'');
    let stripped = trimmed.trim_end_matches(['/', '\\']);
    if stripped.is_empty() && !trimmed.is_empty() {
        // The root of the filesystem.
        return PathBuf::from(&trimmed[..1]);
    }
    PathBuf::from(stripped)
}
