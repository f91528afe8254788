//! # Audit Log and Integrity Verifier
//!
//! An [`AuditLogEntry`] is an Ed25519-signed copy of the invoice snapshot a
//! record was built from, captured when the record was made. The
//! [`IntegrityVerifier`] later rebuilds the record from that snapshot alone
//! and checks that it reproduces the hash stored in the ledger.
//!
//! ## Security Invariant
//!
//! Verification fails closed: an entry whose signer is not the trusted key,
//! or whose signature does not cover its canonical bytes, is reported as
//! [`VerificationResult::SignatureInvalid`] before the ledger is consulted.
//! The signing input is `CanonicalBytes` of every field except the
//! signature itself.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use vf_core::{CanonicalBytes, CryptoError, InvoiceIdentifier, RecordHash, RecordKind};
use vf_crypto::{AuditKeyPair, AuditPublicKey, AuditSignature};
use vf_record::{BreakdownDefaults, HashPayload, InvoiceSnapshot, RecordBody};

use crate::error::ChainError;
use crate::hooks::{HookFlow, PostSubmitContext, PostSubmitHook};
use crate::ledger::ChainLedger;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from audit-log storage and signing.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit log I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode audit entry {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("audit entry {path} already exists")]
    Exists { path: String },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

fn io(path: &Path, source: std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Signed invoice snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Kind of record the snapshot produced.
    pub kind: RecordKind,
    /// Invoice state when the record was made.
    pub snapshot: InvoiceSnapshot,
    /// When the entry was signed.
    pub recorded_at: DateTime<Utc>,
    /// Key that signed the entry.
    pub signer: AuditPublicKey,
    /// Signature over the canonical form of the other fields.
    pub signature: AuditSignature,
}

#[derive(Serialize)]
struct SigningInput<'a> {
    id: &'a Uuid,
    kind: RecordKind,
    snapshot: &'a InvoiceSnapshot,
    recorded_at: &'a DateTime<Utc>,
    signer: &'a AuditPublicKey,
}

impl AuditLogEntry {
    /// Sign `snapshot` as the source of a `kind` record.
    ///
    /// # Errors
    ///
    /// [`CryptoError::Canonicalization`] if the snapshot cannot be
    /// canonicalized.
    pub fn sign(
        kind: RecordKind,
        snapshot: InvoiceSnapshot,
        key: &AuditKeyPair,
    ) -> Result<Self, CryptoError> {
        let id = Uuid::new_v4();
        let recorded_at = Utc::now().trunc_subsecs(0);
        let signer = key.public_key();
        let bytes = CanonicalBytes::new(&SigningInput {
            id: &id,
            kind,
            snapshot: &snapshot,
            recorded_at: &recorded_at,
            signer: &signer,
        })?;
        let signature = key.sign(&bytes);
        Ok(Self {
            id,
            kind,
            snapshot,
            recorded_at,
            signer,
            signature,
        })
    }

    /// The invoice the entry is about.
    pub fn invoice_id(&self) -> InvoiceIdentifier {
        self.snapshot.invoice_id()
    }

    /// Check the signer is `trusted` and the signature covers the entry.
    pub fn verify_signature(&self, trusted: &AuditPublicKey) -> Result<(), CryptoError> {
        if &self.signer != trusted {
            return Err(CryptoError::VerificationFailed(format!(
                "entry signed by {}, expected {}",
                self.signer.to_hex(),
                trusted.to_hex()
            )));
        }
        let bytes = CanonicalBytes::new(&SigningInput {
            id: &self.id,
            kind: self.kind,
            snapshot: &self.snapshot,
            recorded_at: &self.recorded_at,
            signer: &self.signer,
        })?;
        trusted.verify(&bytes, &self.signature)
    }
}

// ---------------------------------------------------------------------------
// File-backed audit log
// ---------------------------------------------------------------------------

/// Audit entries stored as `{root}/{issuer}/{invoice}.{kind}.json`, each
/// written once. `{invoice}` is [`InvoiceIdentifier::path_segment`].
#[derive(Debug, Clone)]
pub struct AuditLog {
    root: PathBuf,
}

impl AuditLog {
    /// Use `root` as the log directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the entry for `invoice` and `kind` lives.
    pub fn entry_path(&self, invoice: &InvoiceIdentifier, kind: RecordKind) -> PathBuf {
        self.root
            .join(invoice.issuer_id.as_str())
            .join(format!("{}.{}.json", invoice.path_segment(), kind))
    }

    /// Store `entry`; an entry already stored for the same invoice and kind
    /// is never replaced.
    pub fn append(&self, entry: &AuditLogEntry) -> Result<PathBuf, AuditError> {
        let path = self.entry_path(&entry.invoice_id(), entry.kind);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io(dir, e))?;
        }
        let json = serde_json::to_vec_pretty(entry).map_err(|e| AuditError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AuditError::Exists {
                    path: path.display().to_string(),
                })
            }
            Err(e) => return Err(io(&path, e)),
        };
        file.write_all(&json).map_err(|e| io(&path, e))?;
        file.sync_all().map_err(|e| io(&path, e))?;
        Ok(path)
    }

    /// Load the entry for `invoice` and `kind`, if any.
    pub fn get(
        &self,
        invoice: &InvoiceIdentifier,
        kind: RecordKind,
    ) -> Result<Option<AuditLogEntry>, AuditError> {
        let path = self.entry_path(invoice, kind);
        match fs::read(&path) {
            Ok(bytes) => read_entry(&path, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io(&path, e)),
        }
    }
}

/// Decode an entry read from `path`.
pub fn read_entry(path: &Path, bytes: &[u8]) -> Result<AuditLogEntry, AuditError> {
    serde_json::from_slice(bytes).map_err(|e| AuditError::Decode {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Post-submission hook that signs and stores the snapshot of every
/// persisted record.
#[derive(Debug)]
pub struct AuditRecorder {
    log: AuditLog,
    key: AuditKeyPair,
}

impl AuditRecorder {
    /// Record into `log`, signing with `key`.
    pub fn new(log: AuditLog, key: AuditKeyPair) -> Self {
        Self { log, key }
    }
}

impl PostSubmitHook for AuditRecorder {
    fn name(&self) -> &str {
        "audit-recorder"
    }

    fn after_submit(&self, ctx: &PostSubmitContext<'_>) -> HookFlow<()> {
        let Some(snapshot) = ctx.snapshot else {
            return HookFlow::Continue;
        };
        let result = AuditLogEntry::sign(ctx.record.kind(), snapshot.clone(), &self.key)
            .map_err(AuditError::from)
            .and_then(|entry| self.log.append(&entry));
        match result {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "audit entry written");
                HookFlow::Continue
            }
            Err(e) => HookFlow::Abort(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Integrity verifier
// ---------------------------------------------------------------------------

/// Outcome of verifying one audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VerificationResult {
    /// The snapshot reproduces the stored hash.
    Match { hash: RecordHash },
    /// The entry's signature or signer is not trusted.
    SignatureInvalid { reason: String },
    /// The snapshot does not reproduce the stored hash.
    HashMismatch {
        stored: RecordHash,
        recomputed: Option<RecordHash>,
        reason: String,
    },
    /// No record of that kind was persisted for the invoice.
    NotFound,
}

impl VerificationResult {
    /// True for [`VerificationResult::Match`].
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }
}

/// Re-derives records from audit entries and compares them to the ledger.
#[derive(Debug)]
pub struct IntegrityVerifier<'a, L> {
    ledger: &'a L,
    defaults: BreakdownDefaults,
    trusted_key: AuditPublicKey,
}

impl<'a, L: ChainLedger> IntegrityVerifier<'a, L> {
    /// Verify against `ledger`, trusting entries signed by `trusted_key`.
    pub fn new(ledger: &'a L, defaults: BreakdownDefaults, trusted_key: AuditPublicKey) -> Self {
        Self {
            ledger,
            defaults,
            trusted_key,
        }
    }

    /// Verify one entry.
    ///
    /// # Errors
    ///
    /// [`ChainError::Ledger`] if the ledger cannot be read. Every
    /// verification verdict, negative ones included, is an `Ok`.
    pub fn verify(&self, entry: &AuditLogEntry) -> Result<VerificationResult, ChainError> {
        if let Err(e) = entry.verify_signature(&self.trusted_key) {
            tracing::warn!(entry = %entry.id, error = %e, "audit entry signature invalid");
            return Ok(VerificationResult::SignatureInvalid {
                reason: e.to_string(),
            });
        }

        let invoice = entry.invoice_id();
        let Some(stored) = self.ledger.find(&invoice, entry.kind)? else {
            return Ok(VerificationResult::NotFound);
        };
        let record = &stored.record;
        let mismatch = |recomputed: Option<RecordHash>, reason: String| {
            tracing::warn!(
                invoice = %invoice,
                kind = %entry.kind,
                stored = record.hash().as_str(),
                reason = %reason,
                "integrity verification failed"
            );
            VerificationResult::HashMismatch {
                stored: record.hash().clone(),
                recomputed,
                reason,
            }
        };

        if !record.verify_hash() {
            return Ok(mismatch(
                Some(record.calculate_hash()),
                "ledger record does not match its own hash".to_string(),
            ));
        }

        let body = match entry.kind {
            RecordKind::Registration => entry
                .snapshot
                .to_registration(&self.defaults)
                .map(RecordBody::Registration),
            RecordKind::Cancellation => Ok(RecordBody::Cancellation(entry.snapshot.to_cancellation())),
        };
        let body = match body {
            Ok(b) => b,
            Err(e) => {
                return Ok(mismatch(
                    None,
                    format!("snapshot does not yield a valid record: {e}"),
                ))
            }
        };

        let recomputed = HashPayload::new(&body, record.previous(), record.hashed_at()).digest();
        if &recomputed != record.hash() {
            return Ok(mismatch(
                Some(recomputed),
                "snapshot does not reproduce the stored hash".to_string(),
            ));
        }
        Ok(VerificationResult::Match { hash: recomputed })
    }
}
