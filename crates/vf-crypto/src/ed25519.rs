//! # Ed25519 — Audit-Log Tamper Evidence
//!
//! Audit-log entries are signed when they are captured and verified before
//! they are trusted to reconstruct a record.
//!
//! ## Security Invariant
//!
//! - Signing and verification take `&CanonicalBytes`, never raw bytes, so the
//!   signer and the verifier cannot disagree on serialization.
//! - `AuditKeyPair` does not implement `Serialize` and its `Debug` output
//!   never contains key material.
//! - Public keys and signatures travel as lowercase hex strings.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use vf_core::{CanonicalBytes, CryptoError};

/// Public key trusted to have signed audit-log entries.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuditPublicKey([u8; 32]);

/// Signature over the canonical form of an audit-log entry.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuditSignature([u8; 64]);

/// Signing key held by the audit-log writer.
pub struct AuditKeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl AuditPublicKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a 64-character hex key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyError`] for malformed hex or a point that is
    /// not a valid Ed25519 public key.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = from_hex::<32>(hex).map_err(CryptoError::KeyError)?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))?;
        Ok(Self(bytes))
    }

    /// Verify `signature` over `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::VerificationFailed`] if the signature does not
    /// verify under this key.
    pub fn verify(&self, data: &CanonicalBytes, signature: &AuditSignature) -> Result<(), CryptoError> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))?;
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify_strict(data.as_bytes(), &sig)
            .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
    }
}

impl Serialize for AuditPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AuditPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for AuditPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuditPublicKey({}...)", &self.to_hex()[..8])
    }
}

impl AuditSignature {
    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a 128-character hex signature.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::VerificationFailed`] for malformed hex.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        from_hex::<64>(hex)
            .map(Self)
            .map_err(CryptoError::VerificationFailed)
    }
}

impl Serialize for AuditSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AuditSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for AuditSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuditSignature({}...)", &self.to_hex()[..8])
    }
}

impl AuditKeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Rebuild a key pair from its 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Parse a 64-character hex seed.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyError`] for malformed hex.
    pub fn from_seed_hex(hex: &str) -> Result<Self, CryptoError> {
        from_hex::<32>(hex)
            .map(|seed| Self::from_seed(&seed))
            .map_err(CryptoError::KeyError)
    }

    /// The matching public key.
    pub fn public_key(&self) -> AuditPublicKey {
        AuditPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign canonical bytes.
    pub fn sign(&self, data: &CanonicalBytes) -> AuditSignature {
        AuditSignature(self.signing_key.sign(data.as_bytes()).to_bytes())
    }
}

impl std::fmt::Debug for AuditKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuditKeyPair(<private>)")
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex<const N: usize>(hex: &str) -> Result<[u8; N], String> {
    let hex = hex.trim();
    if hex.len() != N * 2 {
        return Err(format!("expected {} hex chars, got {}", N * 2, hex.len()));
    }
    if !hex.is_ascii() {
        return Err("hex string contains non-ASCII characters".into());
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("invalid hex at position {}: {e}", i * 2))?;
    }
    Ok(out)
}
