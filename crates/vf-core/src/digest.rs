//! # Record Hash — Chain Fingerprints
//!
//! A record's fingerprint (`Huella`) is the uppercase hexadecimal SHA-256 of
//! its hash payload. The chain reference a successor carries is the first 64
//! characters of that text.
//!
//! Digest computation lives in `vf-crypto`; this module only owns the
//! representation.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RecordError;

/// Length of the chain reference carried by a successor record.
pub const CHAIN_REFERENCE_LEN: usize = 64;

/// Uppercase hex fingerprint of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordHash(String);

impl RecordHash {
    /// Render a raw 32-byte digest as a fingerprint.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(digest.iter().map(|b| format!("{b:02X}")).collect())
    }

    /// Accept an existing fingerprint. Lowercase input is upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidIdentifier`] unless the value is at least
    /// 64 hexadecimal characters.
    pub fn parse(s: &str) -> Result<Self, RecordError> {
        let upper = s.trim().to_ascii_uppercase();
        if upper.len() < CHAIN_REFERENCE_LEN || !upper.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RecordError::InvalidIdentifier(format!(
                "record hash {s:?} must be at least {CHAIN_REFERENCE_LEN} hex characters"
            )));
        }
        Ok(Self(upper))
    }

    /// The full fingerprint text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The reference a successor record stores as its previous hash.
    pub fn chain_reference(&self) -> RecordHash {
        Self(self.0.chars().take(CHAIN_REFERENCE_LEN).collect())
    }
}

impl std::fmt::Display for RecordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
