//! Decode probes: a full structural decode of an audio file.
//!
//! The probe is independent of the [fingerprint
//! source](crate::source): the fingerprint proves what the encoder *claimed*,
//! the probe proves the frames still decode.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("could not run {tool}: {source}")]
    Spawn { tool: String, source: io::Error },
    #[error("{tool} --test exited with {status}{}", fmt_detail(.detail))]
    Failed { tool: String, status: String, detail: String },
}

fn fmt_detail(detail: &str) -> String {
    if detail.is_empty() { String::new() } else { format!(": {detail}") }
}

/// Structurally validates one file.
pub trait DecodeProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<(), ProbeError>;
}

/// Runs `flac --test --silent <file>`.
pub struct FlacTestProbe {
    exe: PathBuf,
}

impl FlacTestProbe {
    pub fn new<P: AsRef<Path>>(exe: P) -> Self {
        Self { exe: exe.as_ref().to_owned() }
    }
}

impl DecodeProbe for FlacTestProbe {
    fn probe(&self, path: &Path) -> Result<(), ProbeError> {
        let tool = self.exe.display().to_string();
        let out = Command::new(&self.exe)
            .arg("--test")
            .arg("--silent")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ProbeError::Spawn { tool: tool.clone(), source })?;

        if out.status.success() {
            return Ok(());
        }
        // flac reports decode errors on stderr; keep the last line, it names the failure.
        let stderr = String::from_utf8_lossy(&out.stderr);
        let detail = stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .unwrap_or_default()
            .to_owned();
        Err(ProbeError::Failed { tool, status: out.status.to_string(), detail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_a_spawn_error() {
        let probe = FlacTestProbe::new("/nonexistent/flac-binary");
        let err = probe.probe(Path::new("a.flac")).unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/flac-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_a_failure() {
        let probe = FlacTestProbe::new("false");
        let err = probe.probe(Path::new("a.flac")).unwrap_err();
        match err {
            ProbeError::Failed { tool, status, .. } => {
                assert_eq!(tool, "false");
                assert!(status.contains('1'));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(FlacTestProbe::new("true").probe(Path::new("a.flac")).is_ok());
    }

    #[test]
    fn failed_display_includes_detail_when_present() {
        let err = ProbeError::Failed {
            tool:   "flac".into(),
            status: "exit status: 1".into(),
            detail: "FLAC__STREAM_DECODER_ERROR_STATUS_LOST_SYNC".into(),
        };
        assert_eq!(
            err.to_string(),
            "flac --test exited with exit status: 1: FLAC__STREAM_DECODER_ERROR_STATUS_LOST_SYNC"
        );
        let bare = ProbeError::Failed { tool: "flac".into(), status: "exit status: 1".into(), detail: String::new() };
        assert_eq!(bare.to_string(), "flac --test exited with exit status: 1");
    }
}
