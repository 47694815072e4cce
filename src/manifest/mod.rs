//! The fingerprint manifest (`.ffp` file) of one album folder.
//!
//! ```no_run
//! use ffpcheck::manifest::Manifest;
//!
//! let m = Manifest::read("Album/Album.ffp")?;
//! for (path, fingerprint) in m.entries() {
//!     println!("{path} -> {fingerprint}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # On-disk format
//! Plain text, one `relative/path:fingerprint` line per entry, sorted by
//! path, `\n` after every line.  No header, no version field.  See
//! [`format`] for the accepted line syntaxes.
//!
//! # Encoding
//! UTF-8 is expected.  A file that is not valid UTF-8 was written by an older
//! tool in a single-byte code page; it is decoded as Latin-1 so that every
//! byte still maps to a character and the file remains parseable.

pub mod format;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::fingerprint::Fingerprint;
use format::{LineError, ManifestLine};

/// Conventional manifest extension, without the dot.
pub const MANIFEST_EXTENSION: &str = "ffp";

const UTF8_BOM: &str = "\u{feff}";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Error reading file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Error reading file {}: line {line}: {reason}", .path.display())]
    Parse { path: PathBuf, line: usize, reason: LineError },
    #[error("Error creating file {}: a manifest already exists", .0.display())]
    Exists(PathBuf),
    #[error("Error creating file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Error creating file {}: cannot store {key:?}: {reason}", .path.display())]
    InvalidKey { path: PathBuf, key: String, reason: &'static str },
    #[error("cannot derive a manifest name for {}", .0.display())]
    Unnamed(PathBuf),
}

/// What [`Manifest::write`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// No entries; nothing was created.
    SkippedEmpty,
}

// ── Manifest ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    location: PathBuf,
    name:     String,
    entries:  BTreeMap<String, Fingerprint>,
}

impl Manifest {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(location: P, name: S) -> Self {
        Self { location: location.into(), name: name.into(), entries: BTreeMap::new() }
    }

    /// An empty manifest for `folder`, named `<folder name>.<extension>`.
    pub fn for_folder(folder: &Path, extension: &str) -> Result<Self, ManifestError> {
        let base = folder
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ManifestError::Unnamed(folder.to_owned()))?;
        Ok(Self::new(folder, format!("{base}.{extension}")))
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    /// Directory the manifest lives in; entry paths are relative to it.
    pub fn location(&self) -> &Path { &self.location }
    pub fn name(&self) -> &str { &self.name }
    pub fn path(&self) -> PathBuf { self.location.join(&self.name) }

    pub fn entries(&self) -> &BTreeMap<String, Fingerprint> { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, relative: &str) -> Option<&Fingerprint> {
        self.entries.get(relative)
    }

    /// Absolute location of an entry.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.location.join(relative)
    }

    /// Add or replace an entry, returning the previous fingerprint.
    pub fn insert<S: Into<String>>(&mut self, relative: S, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.entries.insert(relative.into(), fingerprint)
    }

    // ── Read ─────────────────────────────────────────────────────────────────

    /// Load and parse the manifest at `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|source| ManifestError::Read { path: path.to_owned(), source })?;
        let text = decode_text(&bytes);
        if matches!(text, Cow::Owned(_)) {
            debug!(manifest = %path.display(), "not UTF-8, decoded as Latin-1");
        }
        let location = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(location, name, &text)
    }

    /// Parse manifest text.  The first unparsable line fails the whole
    /// manifest: a partially understood manifest is not used for verification.
    pub fn parse<P: Into<PathBuf>, S: Into<String>>(
        location: P,
        name:     S,
        text:     &str,
    ) -> Result<Self, ManifestError> {
        let mut manifest = Self::new(location, name);
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

        for (idx, raw) in text.lines().enumerate() {
            match format::classify(raw) {
                Ok(ManifestLine::Entry { path, fingerprint, .. }) => {
                    if let Some(prev) = manifest.entries.insert(path.clone(), fingerprint) {
                        if prev != fingerprint {
                            warn!(manifest = %manifest.path().display(), path = %path,
                                  "duplicate entry with a different fingerprint, keeping the last");
                        }
                    }
                }
                Ok(ManifestLine::Comment | ManifestLine::Blank) => {}
                Err(reason) => {
                    return Err(ManifestError::Parse { path: manifest.path(), line: idx + 1, reason });
                }
            }
        }
        Ok(manifest)
    }

    // ── Write ────────────────────────────────────────────────────────────────

    /// Serialise the entries, sorted by path.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), ManifestError> {
        for (key, fingerprint) in &self.entries {
            if let Some(reason) = format::invalid_key_reason(key) {
                return Err(ManifestError::InvalidKey { path: self.path(), key: key.clone(), reason });
            }
            writeln!(out, "{}", format::render(key, fingerprint))
                .map_err(|source| ManifestError::Write { path: self.path(), source })?;
        }
        out.flush().map_err(|source| ManifestError::Write { path: self.path(), source })
    }

    pub fn to_text(&self) -> Result<String, ManifestError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Persist to [`path`](Self::path).
    ///
    /// An empty manifest is never written.  An existing file is never
    /// replaced.  If writing fails part way, the partial file is removed.
    pub fn write(&self) -> Result<WriteOutcome, ManifestError> {
        if self.is_empty() {
            return Ok(WriteOutcome::SkippedEmpty);
        }
        let path = self.path();
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ManifestError::Exists(path));
            }
            Err(source) => return Err(ManifestError::Write { path, source }),
        };

        let result = self.write_to(BufWriter::new(file));
        if result.is_err() {
            remove_file_quietly(&path);
        }
        result.map(|()| WriteOutcome::Written(path))
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Decode manifest bytes: UTF-8, falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s)  => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

fn remove_file_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(file = %path.display(), "removed partial manifest"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "could not remove partial manifest"),
    }
}

/// Remove `path` if it exists and is zero bytes long.  Returns whether it
/// was removed.
pub fn remove_if_empty(path: &Path) -> io::Result<bool> {
    match File::open(path).and_then(|f| f.metadata()) {
        Ok(meta) if meta.len() == 0 => {
            fs::remove_file(path)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
