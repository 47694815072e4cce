//! Fingerprint sources: where a file's embedded stream checksum comes from.
//!
//! Two built-in sources are available:
//!   - [`StreamInfoSource`] parses the FLAC metadata blocks directly and
//!     lifts the MD5 out of `STREAMINFO`.  No external tool is needed.
//!   - [`MetaflacSource`] shells out to `metaflac --show-md5sum`.
//!
//! Both return [`Fingerprint::UNSET`] verbatim when the encoder left the
//! digest empty; deciding that this is an error belongs to the caller.

mod streaminfo;

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::fingerprint::Fingerprint;

pub use streaminfo::{read_streaminfo_md5, StreamInfoSource, FLAC_MAGIC, STREAMINFO_LEN};

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("not a FLAC stream (missing fLaC marker)")]
    NotFlac,
    #[error("no STREAMINFO block found")]
    MissingStreamInfo,
    #[error("STREAMINFO block too short: {0} bytes")]
    ShortStreamInfo(u32),
    #[error("stream truncated inside the metadata blocks")]
    Truncated,
    #[error("{tool} exited with {status}: {stderr}")]
    Tool { tool: String, status: String, stderr: String },
    #[error("unexpected output from {tool}: {output:?}")]
    BadOutput { tool: String, output: String },
    #[error("{0}")]
    Io(#[from] io::Error),
}

// ── Source trait ─────────────────────────────────────────────────────────────

/// Extracts the embedded fingerprint of one audio file.
///
/// Implementations are shared across worker threads and must not hold
/// mutable state.
pub trait FingerprintSource: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, SourceError>;
}

// ── SourceKind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    StreamInfo,
    Metaflac,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::StreamInfo => "streaminfo",
            SourceKind::Metaflac   => "metaflac",
        }
    }

    /// Parse from a CLI or config string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "streaminfo" | "native" => Some(SourceKind::StreamInfo),
            "metaflac"              => Some(SourceKind::Metaflac),
            _                       => None,
        }
    }
}

/// Build the source for `kind`.  `metaflac` is only consulted for
/// [`SourceKind::Metaflac`].
pub fn build_source(kind: SourceKind, metaflac: &Path) -> Box<dyn FingerprintSource> {
    match kind {
        SourceKind::StreamInfo => Box::new(StreamInfoSource),
        SourceKind::Metaflac   => Box::new(MetaflacSource::new(metaflac)),
    }
}

// ── metaflac ─────────────────────────────────────────────────────────────────

pub struct MetaflacSource {
    exe: PathBuf,
}

impl MetaflacSource {
    pub fn new<P: AsRef<Path>>(exe: P) -> Self {
        Self { exe: exe.as_ref().to_owned() }
    }
}

impl FingerprintSource for MetaflacSource {
    fn kind(&self) -> SourceKind { SourceKind::Metaflac }

    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, SourceError> {
        let tool = self.exe.display().to_string();
        let out = Command::new(&self.exe)
            .arg("--show-md5sum")
            .arg(path)
            .output()?;
        if !out.status.success() {
            return Err(SourceError::Tool {
                tool,
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_owned(),
            });
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        stdout.trim().parse().map_err(|_| SourceError::BadOutput {
            tool,
            output: stdout.trim().to_owned(),
        })
    }
}
