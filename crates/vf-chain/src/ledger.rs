//! # Chain Ledger — Append-Only Record Chain per Issuer
//!
//! The ledger is the authority on each issuer's chain head: the most
//! recently **persisted** record. Records are only appended after the tax
//! authority accepted them.
//!
//! ## Integrity Invariants
//!
//! Every append is a compare-and-append against the head the caller read:
//!
//! - the caller's expected head hash equals the current head hash
//!   (`None` for an empty chain), else [`LedgerError::HeadMoved`];
//! - the record references exactly the current head, or nothing if and
//!   only if the chain is empty;
//! - the record's stored hash matches its fields;
//! - at most one record of each kind exists per invoice.
//!
//! [`FileLedger`] checks the links of every stored entry as it reads an
//! issuer's file, so an edited ledger file fails loudly instead of feeding a
//! forged head into the next record.
//!
//! ## Writers
//!
//! A writer holds [`ChainLedger::lock_issuer`] from its head read until its
//! append. For [`FileLedger`] that is an OS advisory lock, which also
//! serializes separate processes sharing one ledger directory.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vf_aeat::SubmissionOutcome;
use vf_core::{InvoiceIdentifier, RecordHash, RecordKind, TaxId};
use vf_record::Record;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from ledger reads and appends.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Filesystem failure.
    #[error("ledger I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored line could not be decoded.
    #[error("corrupt ledger {path} line {line}: {reason}")]
    Corrupt {
        path: String,
        line: usize,
        reason: String,
    },

    /// The head changed between the caller's read and its append.
    #[error("chain head for {issuer} moved: expected {expected}, found {actual}")]
    HeadMoved {
        issuer: String,
        expected: String,
        actual: String,
    },

    /// An entry does not continue the chain it is appended to or stored in.
    #[error("broken chain for {issuer} at entry #{sequence}: {reason}")]
    BrokenLink {
        issuer: String,
        sequence: u64,
        reason: String,
    },

    /// A record of this kind already exists for the invoice.
    #[error("{kind} record for {invoice} already in ledger")]
    Duplicate { invoice: String, kind: RecordKind },
}

fn io(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One persisted record with the authority's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// Zero-based position in the issuer's chain.
    pub sequence: u64,
    /// The record as submitted.
    pub record: Record,
    /// Acceptance classification, including any warning code and message.
    pub outcome: SubmissionOutcome,
    /// Secure verification code assigned by the authority.
    #[serde(default)]
    pub csv: Option<String>,
    /// When the entry was written.
    pub persisted_at: DateTime<Utc>,
}

impl ChainEntry {
    /// The full hash of the persisted record.
    pub fn hash(&self) -> &RecordHash {
        self.record.hash()
    }

    /// Registration or cancellation.
    pub fn kind(&self) -> RecordKind {
        self.record.kind()
    }
}

fn describe(hash: Option<&RecordHash>) -> String {
    hash.map(|h| h.as_str().to_string())
        .unwrap_or_else(|| "<empty chain>".to_string())
}

/// Check that `entry` sits at `position` directly after `head`.
fn check_link(
    head: Option<&ChainEntry>,
    entry: &ChainEntry,
    position: u64,
) -> Result<(), LedgerError> {
    let broken = |reason: &str| LedgerError::BrokenLink {
        issuer: entry.record.invoice_id().issuer_id.as_str().to_string(),
        sequence: entry.sequence,
        reason: reason.to_string(),
    };
    if entry.sequence != position {
        return Err(broken(&format!("expected sequence {position}")));
    }
    if let Some(h) = head {
        if h.record.invoice_id().issuer_id != entry.record.invoice_id().issuer_id {
            return Err(broken("record belongs to another issuer"));
        }
    }
    match (head, entry.record.previous()) {
        (None, None) => {}
        (None, Some(_)) => return Err(broken("first record must not reference a predecessor")),
        (Some(_), None) => return Err(broken("chain already has a genesis record")),
        (Some(h), Some(prev)) => {
            if *prev != h.record.as_predecessor() {
                return Err(broken("record does not reference the chain head"));
            }
        }
    }
    if !entry.record.verify_hash() {
        return Err(broken("stored hash does not match record fields"));
    }
    Ok(())
}

/// Re-check every link of a stored chain.
pub fn verify_chain(chain: &[ChainEntry]) -> Result<(), LedgerError> {
    let mut head = None;
    for (i, entry) in chain.iter().enumerate() {
        check_link(head, entry, i as u64)?;
        head = Some(entry);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Chain state
// ---------------------------------------------------------------------------

/// A verified chain with an index of its records by invoice and kind.
#[derive(Debug, Default, Clone)]
struct ChainState {
    entries: Vec<ChainEntry>,
    index: HashMap<(InvoiceIdentifier, RecordKind), usize>,
}

impl ChainState {
    fn head(&self) -> Option<&ChainEntry> {
        self.entries.last()
    }

    fn find(&self, invoice: &InvoiceIdentifier, kind: RecordKind) -> Option<&ChainEntry> {
        self.index
            .get(&(invoice.clone(), kind))
            .and_then(|&i| self.entries.get(i))
    }

    /// Check that `entry` may follow this chain, whose head the caller
    /// expects to be `expected_head`.
    fn check_append(
        &self,
        expected_head: Option<&RecordHash>,
        entry: &ChainEntry,
    ) -> Result<(), LedgerError> {
        let actual = self.head().map(ChainEntry::hash);
        if actual != expected_head {
            return Err(LedgerError::HeadMoved {
                issuer: entry.record.invoice_id().issuer_id.as_str().to_string(),
                expected: describe(expected_head),
                actual: describe(actual),
            });
        }
        self.check_next(entry)
    }

    fn check_next(&self, entry: &ChainEntry) -> Result<(), LedgerError> {
        check_link(self.head(), entry, self.entries.len() as u64)?;
        let id = entry.record.invoice_id();
        if self.find(id, entry.kind()).is_some() {
            return Err(LedgerError::Duplicate {
                invoice: id.to_string(),
                kind: entry.kind(),
            });
        }
        Ok(())
    }

    fn push(&mut self, entry: ChainEntry) {
        self.index.insert(
            (entry.record.invoice_id().clone(), entry.kind()),
            self.entries.len(),
        );
        self.entries.push(entry);
    }
}

// ---------------------------------------------------------------------------
// Ledger trait
// ---------------------------------------------------------------------------

/// Exclusive hold on one issuer's chain across processes. Released on drop.
#[derive(Debug)]
pub struct IssuerLock {
    issuer: String,
    _file: Option<fs::File>,
}

impl IssuerLock {
    /// A lock with no backing file, for ledgers that live in one process.
    pub fn in_process(issuer: &TaxId) -> Self {
        Self {
            issuer: issuer.as_str().to_string(),
            _file: None,
        }
    }

    /// The issuer this lock protects.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

/// Append-only store of each issuer's record chain.
///
/// Implementations must be `Send + Sync`. Callers that read the head and
/// then append hold [`ChainLedger::lock_issuer`] in between; `append` must
/// still reject a stale `expected_head`.
pub trait ChainLedger: Send + Sync {
    /// Every entry of the issuer's chain, oldest first.
    fn entries(&self, issuer: &TaxId) -> Result<Vec<ChainEntry>, LedgerError>;

    /// Append `entry` if the head is still `expected_head`.
    fn append(&self, expected_head: Option<&RecordHash>, entry: ChainEntry) -> Result<(), LedgerError>;

    /// Block until no other writer, in this process or another, holds the
    /// issuer's chain.
    ///
    /// The default suits ledgers that only exist inside one process, where
    /// the engine's entity lock already serializes writers.
    fn lock_issuer(&self, issuer: &TaxId) -> Result<IssuerLock, LedgerError> {
        Ok(IssuerLock::in_process(issuer))
    }

    /// The most recently persisted entry, or `None` for an empty chain.
    fn head(&self, issuer: &TaxId) -> Result<Option<ChainEntry>, LedgerError> {
        Ok(self.entries(issuer)?.pop())
    }

    /// The entry of `kind` for `invoice`, if persisted.
    fn find(
        &self,
        invoice: &InvoiceIdentifier,
        kind: RecordKind,
    ) -> Result<Option<ChainEntry>, LedgerError> {
        Ok(self
            .entries(&invoice.issuer_id)?
            .into_iter()
            .find(|e| e.kind() == kind && e.record.invoice_id() == invoice))
    }
}

// ---------------------------------------------------------------------------
// In-memory ledger
// ---------------------------------------------------------------------------

/// Ledger held in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    chains: RwLock<HashMap<String, ChainState>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainLedger for MemoryLedger {
    fn entries(&self, issuer: &TaxId) -> Result<Vec<ChainEntry>, LedgerError> {
        Ok(self
            .chains
            .read()
            .get(issuer.as_str())
            .map(|c| c.entries.clone())
            .unwrap_or_default())
    }

    fn append(&self, expected_head: Option<&RecordHash>, entry: ChainEntry) -> Result<(), LedgerError> {
        let issuer = entry.record.invoice_id().issuer_id.as_str().to_string();
        let mut chains = self.chains.write();
        let chain = chains.entry(issuer).or_default();
        chain.check_append(expected_head, &entry)?;
        chain.push(entry);
        Ok(())
    }

    fn head(&self, issuer: &TaxId) -> Result<Option<ChainEntry>, LedgerError> {
        Ok(self
            .chains
            .read()
            .get(issuer.as_str())
            .and_then(|c| c.head().cloned()))
    }

    fn find(
        &self,
        invoice: &InvoiceIdentifier,
        kind: RecordKind,
    ) -> Result<Option<ChainEntry>, LedgerError> {
        Ok(self
            .chains
            .read()
            .get(invoice.issuer_id.as_str())
            .and_then(|c| c.find(invoice, kind).cloned()))
    }
}

// ---------------------------------------------------------------------------
// File-backed ledger
// ---------------------------------------------------------------------------

/// What a [`FileLedger`] has already read and verified of one issuer file.
#[derive(Debug, Default)]
struct CachedChain {
    state: ChainState,
    /// Bytes consumed, always at a line boundary.
    offset: u64,
    /// Lines consumed, blank ones included.
    lines: usize,
    modified: Option<SystemTime>,
    /// Bytes after `offset` that do not end in a newline.
    torn_tail: bool,
}

/// Ledger stored as one JSON-lines file per issuer, `{root}/{issuer}.jsonl`.
///
/// Each issuer file is parsed and verified once; later reads only pick up
/// lines appended since, by this or any other process. A file whose length
/// shrank, or whose length is unchanged but was modified, is re-read and
/// re-verified from the start.
///
/// [`ChainLedger::lock_issuer`] takes an exclusive advisory lock on
/// `{root}/{issuer}.lock`, so writers in different processes sharing the
/// directory are serialized too.
#[derive(Debug)]
pub struct FileLedger {
    root: PathBuf,
    cache: Mutex<HashMap<String, CachedChain>>,
}

impl FileLedger {
    /// Open (creating if needed) a ledger directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io(&root, e))?;
        Ok(Self {
            root,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Path of the issuer's chain file.
    pub fn chain_path(&self, issuer: &TaxId) -> PathBuf {
        self.root.join(format!("{}.jsonl", issuer.as_str()))
    }

    /// Path of the issuer's lock file.
    pub fn lock_path(&self, issuer: &TaxId) -> PathBuf {
        self.root.join(format!("{}.lock", issuer.as_str()))
    }

    fn with_chain<R>(
        &self,
        issuer: &TaxId,
        f: impl FnOnce(&ChainState) -> R,
    ) -> Result<R, LedgerError> {
        let mut cache = self.cache.lock();
        let cached = cache.entry(issuer.as_str().to_string()).or_default();
        self.refresh(issuer, cached)?;
        Ok(f(&cached.state))
    }

    /// Bring `cached` up to date with the file. On error the cache is
    /// dropped so the next read starts over.
    fn refresh(&self, issuer: &TaxId, cached: &mut CachedChain) -> Result<(), LedgerError> {
        let result = self.read_new_lines(issuer, cached);
        if result.is_err() {
            *cached = CachedChain::default();
        }
        result
    }

    fn read_new_lines(&self, issuer: &TaxId, cached: &mut CachedChain) -> Result<(), LedgerError> {
        let path = self.chain_path(issuer);
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if cached.offset > 0 {
                    return Err(LedgerError::Corrupt {
                        path: path.display().to_string(),
                        line: 0,
                        reason: format!(
                            "file is gone after {} entries were read",
                            cached.state.entries.len()
                        ),
                    });
                }
                return Ok(());
            }
            Err(e) => return Err(io(&path, e)),
        };
        let len = meta.len();
        let modified = meta.modified().ok();
        if len < cached.offset || (len == cached.offset && modified != cached.modified) {
            tracing::debug!(path = %path.display(), "ledger file rewritten; reloading");
            *cached = CachedChain::default();
        }
        if len == cached.offset && modified == cached.modified {
            return Ok(());
        }

        let mut file = fs::File::open(&path).map_err(|e| io(&path, e))?;
        file.seek(SeekFrom::Start(cached.offset))
            .map_err(|e| io(&path, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|e| io(&path, e))?;
        let complete = buf.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);

        for line in buf[..complete].split_inclusive(|&b| b == b'\n') {
            cached.lines += 1;
            cached.offset += line.len() as u64;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry: ChainEntry =
                serde_json::from_slice(line).map_err(|e| LedgerError::Corrupt {
                    path: path.display().to_string(),
                    line: cached.lines,
                    reason: e.to_string(),
                })?;
            cached.state.check_next(&entry)?;
            cached.state.push(entry);
        }
        cached.torn_tail = complete < buf.len();
        cached.modified = modified;
        Ok(())
    }
}

impl ChainLedger for FileLedger {
    fn entries(&self, issuer: &TaxId) -> Result<Vec<ChainEntry>, LedgerError> {
        self.with_chain(issuer, |c| c.entries.clone())
    }

    fn append(&self, expected_head: Option<&RecordHash>, entry: ChainEntry) -> Result<(), LedgerError> {
        let issuer = entry.record.invoice_id().issuer_id.clone();
        let path = self.chain_path(&issuer);
        let mut cache = self.cache.lock();
        let cached = cache.entry(issuer.as_str().to_string()).or_default();
        self.refresh(&issuer, cached)?;
        if cached.torn_tail {
            return Err(LedgerError::Corrupt {
                path: path.display().to_string(),
                line: cached.lines + 1,
                reason: "incomplete trailing line".to_string(),
            });
        }
        cached.state.check_append(expected_head, &entry)?;

        let mut line = serde_json::to_string(&entry).map_err(|e| LedgerError::Corrupt {
            path: path.display().to_string(),
            line: cached.lines + 1,
            reason: e.to_string(),
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io(&path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| io(&path, e))?;
        file.sync_all().map_err(|e| io(&path, e))?;
        let meta = file.metadata().map_err(|e| io(&path, e))?;

        tracing::debug!(
            issuer = issuer.as_str(),
            sequence = entry.sequence,
            hash = entry.hash().as_str(),
            "ledger entry appended"
        );

        let offset = cached.offset + line.len() as u64;
        if meta.len() == offset {
            cached.offset = offset;
            cached.lines += 1;
            cached.modified = meta.modified().ok();
            cached.state.push(entry);
        } else {
            // Another writer appended without holding the issuer lock.
            tracing::warn!(path = %path.display(), "ledger grew unexpectedly; reloading");
            *cached = CachedChain::default();
        }
        Ok(())
    }

    fn lock_issuer(&self, issuer: &TaxId) -> Result<IssuerLock, LedgerError> {
        let path = self.lock_path(issuer);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io(&path, e))?;
        if file.try_lock_exclusive().is_err() {
            tracing::debug!(
                issuer = issuer.as_str(),
                path = %path.display(),
                "waiting for ledger lock held elsewhere"
            );
            file.lock_exclusive().map_err(|e| io(&path, e))?;
        }
        Ok(IssuerLock {
            issuer: issuer.as_str().to_string(),
            _file: Some(file),
        })
    }

    fn head(&self, issuer: &TaxId) -> Result<Option<ChainEntry>, LedgerError> {
        self.with_chain(issuer, |c| c.head().cloned())
    }

    fn find(
        &self,
        invoice: &InvoiceIdentifier,
        kind: RecordKind,
    ) -> Result<Option<ChainEntry>, LedgerError> {
        self.with_chain(&invoice.issuer_id, |c| c.find(invoice, kind).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{FiscalIdentifier, HashedAt, InvoiceNumber, IssueDate};
    use vf_record::{Cancellation, ComputerSystem, Draft, RecordBody};

    fn system() -> ComputerSystem {
        ComputerSystem {
            vendor: FiscalIdentifier::new("Software SL", TaxId::new("B87654321").unwrap())
                .unwrap(),
            name: "vf".into(),
            id: "VF".into(),
            version: "0.1.0".into(),
            installation_number: "1".into(),
            only_supports_verifactu: true,
            supports_multiple_taxpayers: false,
            has_multiple_taxpayers: false,
        }
    }

    fn id(issuer: &str, n: &str) -> InvoiceIdentifier {
        InvoiceIdentifier::new(
            TaxId::new(issuer).unwrap(),
            InvoiceNumber::new(n).unwrap(),
            IssueDate::from_ymd(2024, 5, 1).unwrap(),
        )
    }

    // A chain opens with a registration; a simplified one needs no recipient.
    fn genesis(issuer: &str) -> ChainEntry {
        let body = vf_record::RegistrationBuilder::new(
            id(issuer, "FA-1"),
            "Emisor SL",
            vf_core::InvoiceType::F2,
        )
        .description("Ticket")
        .line(vf_record::BreakdownLine {
            tax_type: vf_core::TaxType::Iva,
            regime: None,
            operation: vf_core::OperationType::S1,
            tax_rate: vf_core::TaxRate::parse("21.00").unwrap(),
            base_amount: vf_core::Amount::parse("10.00").unwrap(),
            tax_amount: vf_core::Amount::parse("2.10").unwrap(),
        })
        .build()
        .unwrap();
        entry(0, RecordBody::Registration(body), None)
    }

    fn entry(sequence: u64, body: RecordBody, head: Option<&ChainEntry>) -> ChainEntry {
        let record = Draft::new(body, system())
            .unwrap()
            .link(
                head.map(|h| h.record.as_predecessor()),
                HashedAt::parse("2024-05-01T10:00:00+02:00").unwrap(),
            )
            .unwrap();
        ChainEntry {
            sequence,
            record,
            outcome: SubmissionOutcome::Accepted,
            csv: None,
            persisted_at: Utc::now(),
        }
    }

    fn cancel(head: &ChainEntry, issuer: &str, n: &str) -> ChainEntry {
        entry(
            head.sequence + 1,
            RecordBody::Cancellation(Cancellation {
                invoice_id: id(issuer, n),
            }),
            Some(head),
        )
    }

    fn exercise(ledger: &dyn ChainLedger) {
        let issuer = TaxId::new("B12345678").unwrap();
        assert!(ledger.head(&issuer).unwrap().is_none());

        let first = genesis("B12345678");
        ledger.append(None, first.clone()).unwrap();
        assert_eq!(ledger.head(&issuer).unwrap().unwrap(), first);

        // Stale expected head.
        let second = cancel(&first, "B12345678", "FA-1");
        let err = ledger.append(None, second.clone()).unwrap_err();
        assert!(matches!(err, LedgerError::HeadMoved { .. }));

        ledger.append(Some(first.hash()), second.clone()).unwrap();
        assert_eq!(ledger.entries(&issuer).unwrap().len(), 2);
        assert_eq!(
            ledger
                .find(&id("B12345678", "FA-1"), RecordKind::Cancellation)
                .unwrap()
                .unwrap(),
            second
        );

        // Second cancellation of the same invoice.
        let again = cancel(&second, "B12345678", "FA-1");
        let err = ledger.append(Some(second.hash()), again).unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate { .. }));

        // A record linking to a stale head.
        let mut forked = cancel(&first, "B12345678", "FA-9");
        forked.sequence = 2;
        let err = ledger.append(Some(second.hash()), forked).unwrap_err();
        assert!(matches!(err, LedgerError::BrokenLink { .. }));

        // Other issuers have their own chain.
        let other = TaxId::new("A39200019").unwrap();
        assert!(ledger.head(&other).unwrap().is_none());
        ledger.append(None, genesis("A39200019")).unwrap();
        assert_eq!(ledger.entries(&issuer).unwrap().len(), 2);
    }

    #[test]
    fn memory_ledger_enforces_chain() {
        exercise(&MemoryLedger::new());
    }

    #[test]
    fn file_ledger_enforces_chain_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path()).unwrap();
        exercise(&ledger);
        drop(ledger);

        let reopened = FileLedger::open(dir.path()).unwrap();
        let issuer = TaxId::new("B12345678").unwrap();
        let chain = reopened.entries(&issuer).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].kind(), RecordKind::Cancellation);
    }

    #[test]
    fn edited_ledger_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path()).unwrap();
        let first = genesis("B12345678");
        ledger.append(None, first.clone()).unwrap();
        ledger
            .append(Some(first.hash()), cancel(&first, "B12345678", "FA-1"))
            .unwrap();

        let issuer = TaxId::new("B12345678").unwrap();
        let path = ledger.chain_path(&issuer);
        let text = fs::read_to_string(&path).unwrap();
        fs::write(
            &path,
            text.replacen("2024-05-01T10:00:00+02:00", "2024-05-01T11:00:00+02:00", 1),
        )
        .unwrap();

        let err = ledger.entries(&issuer).unwrap_err();
        assert!(matches!(err, LedgerError::BrokenLink { sequence: 0, .. }));
    }

    #[test]
    fn garbage_line_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path()).unwrap();
        let issuer = TaxId::new("B12345678").unwrap();
        fs::write(ledger.chain_path(&issuer), "{not json}\n").unwrap();
        assert!(matches!(
            ledger.head(&issuer),
            Err(LedgerError::Corrupt { line: 1, .. })
        ));
    }

    #[test]
    fn cached_chain_picks_up_appends_from_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let reader = FileLedger::open(dir.path()).unwrap();
        let writer = FileLedger::open(dir.path()).unwrap();
        let issuer = TaxId::new("B12345678").unwrap();

        let first = genesis("B12345678");
        writer.append(None, first.clone()).unwrap();
        assert_eq!(reader.head(&issuer).unwrap().unwrap(), first);

        let second = cancel(&first, "B12345678", "FA-1");
        writer.append(Some(first.hash()), second.clone()).unwrap();
        assert_eq!(reader.head(&issuer).unwrap().unwrap(), second);
        assert_eq!(
            reader
                .find(&id("B12345678", "FA-1"), RecordKind::Cancellation)
                .unwrap()
                .unwrap(),
            second
        );

        // The reader's view is current, so its own stale append is refused.
        let err = reader.append(Some(first.hash()), cancel(&first, "B12345678", "FA-2"));
        assert!(matches!(err, Err(LedgerError::HeadMoved { .. })));
    }

    #[test]
    fn torn_trailing_line_blocks_appends() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path()).unwrap();
        let issuer = TaxId::new("B12345678").unwrap();
        let first = genesis("B12345678");
        ledger.append(None, first.clone()).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(ledger.chain_path(&issuer))
            .unwrap();
        file.write_all(b"{\"sequence\":1").unwrap();
        drop(file);

        assert_eq!(ledger.head(&issuer).unwrap().unwrap(), first);
        let err = ledger
            .append(Some(first.hash()), cancel(&first, "B12345678", "FA-1"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { line: 2, .. }));
    }

    #[test]
    fn duplicated_line_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path()).unwrap();
        let issuer = TaxId::new("B12345678").unwrap();
        ledger.append(None, genesis("B12345678")).unwrap();

        let path = ledger.chain_path(&issuer);
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, format!("{text}{text}")).unwrap();

        let fresh = FileLedger::open(dir.path()).unwrap();
        assert!(fresh.entries(&issuer).is_err());
    }

    #[test]
    fn issuer_lock_excludes_other_handles() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let a = FileLedger::open(dir.path()).unwrap();
        let b = FileLedger::open(dir.path()).unwrap();
        let issuer = TaxId::new("B12345678").unwrap();
        let released = AtomicBool::new(false);

        let held = a.lock_issuer(&issuer).unwrap();
        assert_eq!(held.issuer(), "B12345678");
        std::thread::scope(|s| {
            let waiter = s.spawn(|| {
                let _lock = b.lock_issuer(&issuer).unwrap();
                released.load(Ordering::SeqCst)
            });
            std::thread::sleep(Duration::from_millis(150));
            released.store(true, Ordering::SeqCst);
            drop(held);
            assert!(waiter.join().unwrap(), "second handle acquired a held lock");
        });

        // Other issuers are independent.
        let _b = a.lock_issuer(&issuer).unwrap();
        let _other = b.lock_issuer(&TaxId::new("A39200019").unwrap()).unwrap();
    }
}
