//! The 128-bit stream fingerprint recorded in `.ffp` manifests.
//!
//! A fingerprint is the MD5 of a FLAC file's unencoded audio as stored by the
//! encoder in the `STREAMINFO` block.  On disk and in messages it is always
//! rendered as 32 lowercase hex characters.  An encoder that did not compute
//! the digest leaves all 16 bytes zero; that value is [`Fingerprint::UNSET`]
//! and is never accepted as evidence of integrity.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Length of a fingerprint in raw bytes.
pub const FINGERPRINT_LEN: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint must be {} hex characters, got {0}", FINGERPRINT_LEN * 2)]
    BadLength(usize),
    #[error("fingerprint is not valid hex: {0}")]
    BadHex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// The all-zero sentinel: the stream carries no checksum.
    pub const UNSET: Fingerprint = Fingerprint([0u8; FINGERPRINT_LEN]);

    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    #[inline]
    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    /// Accepts upper or lower case; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let chars = s.chars().count();
        if chars != FINGERPRINT_LEN * 2 {
            return Err(FingerprintError::BadLength(chars));
        }
        let mut bytes = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| FingerprintError::BadHex(e.to_string()))?;
        Ok(Fingerprint(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_lowercase() {
        let fp: Fingerprint = "ABCDEF01abcdef01ABCDEF01abcdef01".parse().unwrap();
        assert_eq!(fp.to_string(), "abcdef01abcdef01abcdef01abcdef01");
    }

    #[test]
    fn length_is_counted_in_characters() {
        let wide = format!("\u{e9}{}", "a".repeat(31));
        assert!(matches!(wide.parse::<Fingerprint>(), Err(FingerprintError::BadHex(_))));

        let err = "a".repeat(33).parse::<Fingerprint>().unwrap_err();
        assert_eq!(err, FingerprintError::BadLength(33));
        assert_eq!(err.to_string(), "fingerprint must be 32 hex characters, got 33");
    }

    #[test]
    fn unset_sentinel() {
        let fp: Fingerprint = "00000000000000000000000000000000".parse().unwrap();
        assert!(fp.is_unset());
        assert_eq!(fp, Fingerprint::UNSET);
        assert!(!Fingerprint::from_bytes([1; FINGERPRINT_LEN]).is_unset());
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("abc".parse::<Fingerprint>(), Err(FingerprintError::BadLength(3)));
        assert!(matches!(
            "zzcdef01abcdef01abcdef01abcdef01".parse::<Fingerprint>(),
            Err(FingerprintError::BadHex(_))
        ));
    }
}
