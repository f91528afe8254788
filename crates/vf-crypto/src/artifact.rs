//! # Artifact Store — Write-Once Persisted Payloads
//!
//! Every successfully submitted record leaves two files behind:
//!
//! - a **public** copy, `{root}/{issuer}/{invoice}/{number}-{kind}.xml`,
//!   which the host may delete or overwrite while regenerating documents;
//! - a **protected** copy, `{root}/{issuer}/{invoice}/.{kind}.xml`, written
//!   once, marked read-only, and accompanied by a `.{kind}.sha256` sidecar.
//!
//! `{invoice}` is [`InvoiceIdentifier::path_segment`]: the percent-encoded
//! number plus the issue date, so every invoice the ledger can tell apart
//! gets its own directory.
//!
//! ## Integrity Invariant
//!
//! The protected copy is created with `create_new` semantics through a
//! hard link from a fully written temporary file, so a reader never sees a
//! partial file. Writing different bytes for the same key is a conflict.
//! The public copy is only ever rebuilt from the protected copy, after the
//! sidecar digest has been checked in constant time.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use subtle::ConstantTimeEq;
use vf_core::{InvoiceIdentifier, RecordKind};

use crate::error::StoreError;
use crate::sha256::sha256_hex;

/// Identifies one artifact pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    /// Invoice the record is about.
    pub invoice: InvoiceIdentifier,
    /// Registration or cancellation.
    pub kind: RecordKind,
}

impl ArtifactKey {
    /// Assemble a key.
    pub fn new(invoice: InvoiceIdentifier, kind: RecordKind) -> Self {
        Self { invoice, kind }
    }
}

/// Result of [`ArtifactStore::write_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The protected copy was created by this call.
    Written,
    /// An identical protected copy already existed.
    AlreadyPresent,
}

/// Filesystem-backed store of artifact pairs.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// A store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, key: &ArtifactKey) -> PathBuf {
        self.root
            .join(key.invoice.issuer_id.as_str())
            .join(key.invoice.path_segment())
    }

    /// Path of the public copy.
    pub fn public_path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir(key).join(format!(
            "{}-{}.xml",
            key.invoice.invoice_number.path_segment(),
            key.kind
        ))
    }

    /// Path of the protected copy.
    pub fn source_path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir(key).join(format!(".{}.xml", key.kind))
    }

    fn digest_path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir(key).join(format!(".{}.sha256", key.kind))
    }

    /// True if a protected copy exists for `key`.
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.source_path(key).exists()
    }

    /// Persist `bytes` as the protected copy and publish the public copy.
    ///
    /// Idempotent for identical bytes.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if a protected copy with other content exists;
    /// [`StoreError::Io`] on filesystem failure.
    pub fn write_if_absent(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<WriteOutcome, StoreError> {
        let dir = self.dir(key);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let source = self.source_path(key);
        let outcome = if create_exclusive(&source, bytes)? {
            WriteOutcome::Written
        } else {
            let existing = fs::read(&source).map_err(|e| StoreError::io(&source, e))?;
            if !bool::from(existing.as_slice().ct_eq(bytes)) {
                return Err(StoreError::Conflict { path: source });
            }
            WriteOutcome::AlreadyPresent
        };

        let digest_path = self.digest_path(key);
        create_exclusive(&digest_path, sha256_hex(bytes).as_bytes())?;
        mark_read_only(&source)?;
        mark_read_only(&digest_path)?;

        self.republish_from_source(key)?;
        tracing::debug!(
            invoice = %key.invoice,
            kind = %key.kind,
            ?outcome,
            "artifact persisted"
        );
        Ok(outcome)
    }

    /// Read the protected copy, checking it against its sidecar.
    ///
    /// Returns `Ok(None)` if no protected copy exists.
    ///
    /// # Errors
    ///
    /// [`StoreError::Integrity`] if the sidecar is missing or does not match.
    pub fn read_source(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, StoreError> {
        let source = self.source_path(key);
        let bytes = match fs::read(&source) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&source, e)),
        };
        let digest_path = self.digest_path(key);
        let expected = match fs::read_to_string(&digest_path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::Integrity {
                    path: source,
                    reason: "digest sidecar is missing".into(),
                })
            }
            Err(e) => return Err(StoreError::io(&digest_path, e)),
        };
        let actual = sha256_hex(&bytes);
        if !bool::from(actual.as_bytes().ct_eq(expected.trim().as_bytes())) {
            return Err(StoreError::Integrity {
                path: source,
                reason: format!("sha256 {actual} does not match sidecar"),
            });
        }
        Ok(Some(bytes))
    }

    /// Rebuild the public copy byte-for-byte from the protected copy.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingSource`] if nothing was ever persisted for `key`,
    /// [`StoreError::Integrity`] if the protected copy fails its check.
    pub fn republish_from_source(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError> {
        let bytes = self.read_source(key)?.ok_or_else(|| StoreError::MissingSource {
            path: self.source_path(key),
        })?;
        let public = self.public_path(key);
        fs::write(&public, &bytes).map_err(|e| StoreError::io(&public, e))?;
        Ok(public)
    }
}

/// Create `path` with `bytes` unless it already exists. Returns whether
/// this call created it.
fn create_exclusive(path: &Path, bytes: &[u8]) -> Result<bool, StoreError> {
    if path.exists() {
        return Ok(false);
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    {
        let mut f = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(bytes).map_err(|e| StoreError::io(&tmp, e))?;
        f.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
    }
    let linked = match fs::hard_link(&tmp, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    };
    let _ = fs::remove_file(&tmp);
    linked
}

fn mark_read_only(path: &Path) -> Result<(), StoreError> {
    let mut perms = fs::metadata(path)
        .map_err(|e| StoreError::io(path, e))?
        .permissions();
    if !perms.readonly() {
        perms.set_readonly(true);
        fs::set_permissions(path, perms).map_err(|e| StoreError::io(path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use vf_core::{InvoiceNumber, IssueDate, TaxId};

    fn invoice(number: &str, (y, m, d): (i32, u32, u32)) -> InvoiceIdentifier {
        InvoiceIdentifier::new(
            TaxId::new("B12345678").unwrap(),
            InvoiceNumber::new(number).unwrap(),
            IssueDate::from_ymd(y, m, d).unwrap(),
        )
    }

    fn key(kind: RecordKind) -> ArtifactKey {
        ArtifactKey::new(invoice("FA/2024/1", (2024, 5, 1)), kind)
    }

    #[test]
    fn paths_follow_layout() {
        let store = ArtifactStore::new("/var/vf");
        let k = key(RecordKind::Registration);
        assert_eq!(
            store.public_path(&k),
            PathBuf::from("/var/vf/B12345678/FA%2F2024%2F1_20240501/FA%2F2024%2F1-registration.xml")
        );
        assert_eq!(
            store.source_path(&k),
            PathBuf::from("/var/vf/B12345678/FA%2F2024%2F1_20240501/.registration.xml")
        );
    }

    #[test]
    fn look_alike_invoices_do_not_share_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let slash = ArtifactKey::new(invoice("T/0001", (2024, 5, 1)), RecordKind::Registration);
        let underscore = ArtifactKey::new(invoice("T_0001", (2024, 5, 1)), RecordKind::Registration);
        let next_year = ArtifactKey::new(invoice("T/0001", (2025, 1, 2)), RecordKind::Registration);

        store.write_if_absent(&slash, b"<a/>").unwrap();
        assert!(store.contains(&slash));
        assert!(!store.contains(&underscore));
        assert!(!store.contains(&next_year));
        assert_eq!(store.write_if_absent(&underscore, b"<b/>").unwrap(), WriteOutcome::Written);
        assert_eq!(store.write_if_absent(&next_year, b"<c/>").unwrap(), WriteOutcome::Written);
        assert_eq!(store.read_source(&slash).unwrap().unwrap(), b"<a/>");
    }

    #[test]
    fn write_creates_both_copies() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let k = key(RecordKind::Registration);
        assert_eq!(store.write_if_absent(&k, b"<xml/>").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read(store.public_path(&k)).unwrap(), b"<xml/>");
        assert_eq!(store.read_source(&k).unwrap().unwrap(), b"<xml/>");
        assert!(fs::metadata(store.source_path(&k)).unwrap().permissions().readonly());
    }

    #[test]
    fn identical_rewrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let k = key(RecordKind::Cancellation);
        store.write_if_absent(&k, b"<a/>").unwrap();
        assert_eq!(
            store.write_if_absent(&k, b"<a/>").unwrap(),
            WriteOutcome::AlreadyPresent
        );
    }

    #[test]
    fn different_rewrite_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let k = key(RecordKind::Registration);
        store.write_if_absent(&k, b"<a/>").unwrap();
        assert!(matches!(
            store.write_if_absent(&k, b"<b/>"),
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(store.read_source(&k).unwrap().unwrap(), b"<a/>");
    }

    #[test]
    fn republish_restores_deleted_public_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let k = key(RecordKind::Registration);
        store.write_if_absent(&k, b"<record>1</record>").unwrap();
        fs::remove_file(store.public_path(&k)).unwrap();
        let path = store.republish_from_source(&k).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"<record>1</record>");
    }

    #[test]
    fn republish_overwrites_regenerated_public_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let k = key(RecordKind::Registration);
        store.write_if_absent(&k, b"<original/>").unwrap();
        fs::write(store.public_path(&k), b"<regenerated/>").unwrap();
        store.republish_from_source(&k).unwrap();
        assert_eq!(fs::read(store.public_path(&k)).unwrap(), b"<original/>");
    }

    #[test]
    fn republish_without_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(
            store.republish_from_source(&key(RecordKind::Registration)),
            Err(StoreError::MissingSource { .. })
        ));
    }

    #[test]
    fn missing_sidecar_is_an_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let k = key(RecordKind::Registration);
        let src = store.source_path(&k);
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"<x/>").unwrap();
        assert!(matches!(store.read_source(&k), Err(StoreError::Integrity { .. })));
    }
}
