//! # vf-crypto — Cryptographic Primitives
//!
//! - **SHA-256** record fingerprints over hash payloads, and plain digests
//!   for artifact integrity sidecars.
//! - **Ed25519** signing and verification of audit-log entries. The signing
//!   input is always `CanonicalBytes`.
//! - **Artifact store**: the write-once pair of persisted payloads per
//!   invoice record, with byte-exact republication from the protected copy.
//!
//! ## Crate Policy
//!
//! - Depends only on `vf-core` internally.
//! - Tests use real SHA-256, real Ed25519 and a real filesystem (`tempfile`).

pub mod artifact;
pub mod ed25519;
pub mod error;
pub mod sha256;

pub use artifact::{ArtifactKey, ArtifactStore, WriteOutcome};
pub use ed25519::{AuditKeyPair, AuditPublicKey, AuditSignature};
pub use error::StoreError;
pub use sha256::{record_hash, sha256_hex};
