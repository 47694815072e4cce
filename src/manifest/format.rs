//! Line syntax of `.ffp` manifests.
//!
//! ```text
//! ; comment
//! disc 1/01 - Intro.flac:0f3a5c1e9d7b2a4c6e8f0a1b2c3d4e5f     <- current
//! 0f3a5c1e9d7b2a4c6e8f0a1b2c3d4e5f *disc 1/01 - Intro.flac    <- legacy
//! ```
//!
//! Each non-comment line is classified by trying the syntaxes in
//! [`LineSyntax::PRIORITY`] order; the first that yields a path and a valid
//! fingerprint wins.  Both syntaxes split on the *last* delimiter, so a path
//! may itself contain `:` (current) or `*` (legacy).  Backslashes are
//! normalised to `/` before splitting.

use thiserror::Error;

use crate::fingerprint::{Fingerprint, FingerprintError};

pub const COMMENT_PREFIX: char = ';';
pub const CURRENT_DELIMITER: char = ':';
pub const LEGACY_DELIMITER: char = '*';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSyntax {
    /// `relative/path:fingerprint`
    Current,
    /// `fingerprint*relative/path`
    Legacy,
}

impl LineSyntax {
    pub const PRIORITY: [LineSyntax; 2] = [LineSyntax::Current, LineSyntax::Legacy];

    fn delimiter(self) -> char {
        match self {
            LineSyntax::Current => CURRENT_DELIMITER,
            LineSyntax::Legacy  => LEGACY_DELIMITER,
        }
    }

    /// Split `line` (already trimmed and normalised) on the last delimiter.
    fn split(self, line: &str) -> Result<(String, Fingerprint), LineError> {
        let (left, right) = line
            .rsplit_once(self.delimiter())
            .ok_or(LineError::NoDelimiter)?;
        let (path, fingerprint) = match self {
            LineSyntax::Current => (left, right),
            LineSyntax::Legacy  => (right.trim(), left),
        };
        if path.is_empty() {
            return Err(LineError::EmptyPath);
        }
        let fingerprint = fingerprint.parse().map_err(LineError::BadFingerprint)?;
        Ok((path.to_owned(), fingerprint))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    Blank,
    Comment,
    Entry { syntax: LineSyntax, path: String, fingerprint: Fingerprint },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("no ':' or '*' delimiter")]
    NoDelimiter,
    #[error("empty file path")]
    EmptyPath,
    #[error("{0}")]
    BadFingerprint(FingerprintError),
}

/// Classify one raw manifest line.
///
/// On failure the error of the highest-priority syntax whose delimiter was
/// present is returned, since that is the syntax the line was meant to be in.
pub fn classify(raw: &str) -> Result<ManifestLine, LineError> {
    if raw.starts_with(COMMENT_PREFIX) {
        return Ok(ManifestLine::Comment);
    }
    let line = raw.trim();
    if line.is_empty() {
        return Ok(ManifestLine::Blank);
    }
    let line = line.replace('\\', "/");

    let mut first_err = None;
    for syntax in LineSyntax::PRIORITY {
        match syntax.split(&line) {
            Ok((path, fingerprint)) => {
                return Ok(ManifestLine::Entry { syntax, path, fingerprint });
            }
            Err(LineError::NoDelimiter) => {}
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    Err(first_err.unwrap_or(LineError::NoDelimiter))
}

/// Why a key cannot be stored in a manifest, if it cannot.
///
/// Keys must survive a write/read cycle unchanged: no line breaks, no
/// backslashes, no surrounding whitespace, and no leading comment marker
/// or byte order mark.
pub fn invalid_key_reason(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        Some("empty path")
    } else if key.contains(['\n', '\r']) {
        Some("line break in path")
    } else if key.contains('\\') {
        Some("backslash in path")
    } else if key.starts_with(COMMENT_PREFIX) {
        Some("path starts with the comment marker")
    } else if key.starts_with('\u{feff}') {
        Some("path starts with a byte order mark")
    } else if key.trim() != key {
        Some("leading or trailing whitespace in path")
    } else {
        None
    }
}

/// Render one entry in the current syntax, without the line terminator.
pub fn render(path: &str, fingerprint: &Fingerprint) -> String {
    format!("{path}{CURRENT_DELIMITER}{fingerprint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FP: &str = "abcdef01abcdef01abcdef01abcdef01";

    fn entry(raw: &str) -> (LineSyntax, String, String) {
        match classify(raw).unwrap() {
            ManifestLine::Entry { syntax, path, fingerprint } => (syntax, path, fingerprint.to_string()),
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn current_syntax() {
        let (syntax, path, fp) = entry(&format!("01 - Intro.flac:{FP}\n"));
        assert_eq!(syntax, LineSyntax::Current);
        assert_eq!(path, "01 - Intro.flac");
        assert_eq!(fp, FP);
    }

    #[test]
    fn splits_on_last_colon() {
        let (_, path, fp) = entry(&format!("disc:1/track01.flac:{FP}"));
        assert_eq!(path, "disc:1/track01.flac");
        assert_eq!(fp, FP);
    }

    #[test]
    fn legacy_syntax() {
        let (syntax, path, fp) = entry(&format!("{FP} *CD1\\02 - Song.flac\r\n"));
        assert_eq!(syntax, LineSyntax::Legacy);
        assert_eq!(path, "CD1/02 - Song.flac");
        assert_eq!(fp, FP);
    }

    #[test]
    fn legacy_path_may_contain_colon() {
        // The current syntax sees a colon but no valid fingerprint after it,
        // so the legacy reading wins.
        let (syntax, path, _) = entry(&format!("{FP}*live: night 1/01.flac"));
        assert_eq!(syntax, LineSyntax::Legacy);
        assert_eq!(path, "live: night 1/01.flac");
    }

    #[test]
    fn comments_and_blanks() {
        assert_eq!(classify("; generated by foobar2000").unwrap(), ManifestLine::Comment);
        assert_eq!(classify("   \r\n").unwrap(), ManifestLine::Blank);
    }

    #[test]
    fn unparsable_lines() {
        assert_eq!(classify("just some text"), Err(LineError::NoDelimiter));
        assert_eq!(classify(&format!(":{FP}")), Err(LineError::EmptyPath));
        assert!(matches!(classify("a.flac:nothex"), Err(LineError::BadFingerprint(_))));
    }

    #[test]
    fn key_validation() {
        assert_eq!(invalid_key_reason("disc 1/a.flac"), None);
        assert_eq!(invalid_key_reason("odd:name.flac"), None);
        assert!(invalid_key_reason("a\nb.flac").is_some());
        assert!(invalid_key_reason(";a.flac").is_some());
        assert!(invalid_key_reason(" a.flac").is_some());
        assert!(invalid_key_reason("a\\b.flac").is_some());
        assert!(invalid_key_reason("\u{feff}01.flac").is_some());
        assert_eq!(invalid_key_reason("01 \u{feff}.flac"), None);
    }
}
