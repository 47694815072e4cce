//! Logging and tracing setup for the `ffp` binary.
//!
//! Diagnostics go to stderr through `tracing`.  `RUST_LOG` wins when set;
//! otherwise the level follows the `-v` count:
//!
//! - none  - `info`
//! - `-v`  - `debug`
//! - `-vv` - `trace`
//!
//! A run can also keep an error log next to the music: every `ERROR` event
//! is copied to `<root>/<Prefix><YYYYmmddHHMMSS>.log`.  The file is deleted
//! at the end of the run if nothing was written to it.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::manifest::remove_if_empty;

pub const VERIFY_LOG_PREFIX: &str = "Verify";
pub const GENERATE_LOG_PREFIX: &str = "Generate_Checksums";

/// `<prefix><YYYYmmddHHMMSS>.log`
pub fn log_file_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{prefix}{}.log", at.format("%Y%m%d%H%M%S"))
}

/// Keeps track of the error log file; see [`LogGuard::finish`].
#[derive(Debug)]
pub struct LogGuard {
    log_file: Option<PathBuf>,
}

impl LogGuard {
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Remove the error log if the run logged no errors.
    pub fn finish(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        let Some(path) = self.log_file.take() else { return };
        if let Err(e) = remove_if_empty(&path) {
            warn!(file = %path.display(), error = %e, "could not remove empty log file");
        }
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn default_filter(verbosity: u8) -> EnvFilter {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::new(format!("ffpcheck={level},ffp={level}"))
}

/// Install the global subscriber.  Call once, at startup.
///
/// `log_file`, when given, is created (truncated) and receives `ERROR`
/// events only.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> io::Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(LevelFilter::ERROR),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(verbosity > 0)
                .compact(),
        )
        .with(file_layer);

    // Already installed (tests, embedding): keep the existing one.
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(LogGuard { log_file: log_file.map(Path::to_path_buf) })
}
