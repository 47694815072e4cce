//! Run configuration, loaded from TOML.
//!
//! ```toml
//! [tools]
//! flac = "flac"
//! metaflac = "metaflac"
//! fingerprint_source = "streaminfo"   # or "metaflac"
//!
//! [scan]
//! extensions = ["flac"]
//! manifest_extension = "ffp"
//! max_path_len = 260
//!
//! [run]
//! jobs = 0          # 0 = one worker per CPU
//! log_file = true
//! ```
//!
//! Every key is optional.  `[supportfiles]` is read as `[tools]` so older
//! configuration files keep working.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::generate::{GenerateOptions, DEFAULT_MAX_PATH_LEN};
use crate::manifest::MANIFEST_EXTENSION;
use crate::source::SourceKind;

/// Looked up in the current directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "ffp.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error reading config {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Error parsing config {}: {source}", .path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("unknown fingerprint source {0:?} (expected \"streaminfo\" or \"metaflac\")")]
    UnknownSource(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "supportfiles")]
    pub tools: Tools,
    pub scan:  Scan,
    pub run:   Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub flac:               PathBuf,
    pub metaflac:           PathBuf,
    pub fingerprint_source: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            flac:               PathBuf::from("flac"),
            metaflac:           PathBuf::from("metaflac"),
            fingerprint_source: SourceKind::StreamInfo.name().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Scan {
    pub extensions:         Vec<String>,
    pub manifest_extension: String,
    pub max_path_len:       usize,
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            extensions:         vec!["flac".to_owned()],
            manifest_extension: MANIFEST_EXTENSION.to_owned(),
            max_path_len:       DEFAULT_MAX_PATH_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Run {
    pub jobs:     usize,
    pub log_file: bool,
}

impl Default for Run {
    fn default() -> Self {
        Self { jobs: 0, log_file: true }
    }
}

impl Config {
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { path: origin.to_owned(), source })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        Self::from_toml(&text, path)
    }

    /// An explicit path must be readable.  Otherwise [`DEFAULT_CONFIG_FILE`]
    /// is used if it exists, and the built-in defaults if it does not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!(config = %path.display(), "loading configuration");
            return Self::from_file(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            debug!(config = %fallback.display(), "loading configuration");
            return Self::from_file(fallback);
        }
        debug!("no configuration file, using defaults");
        Ok(Self::default())
    }

    pub fn source_kind(&self) -> Result<SourceKind, ConfigError> {
        SourceKind::from_name(&self.tools.fingerprint_source)
            .ok_or_else(|| ConfigError::UnknownSource(self.tools.fingerprint_source.clone()))
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            extensions:         self.scan.extensions.clone(),
            manifest_extension: self.scan.manifest_extension.clone(),
            max_path_len:       self.scan.max_path_len,
        }
    }
}
