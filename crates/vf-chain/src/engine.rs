//! # Chain Engine — One Lifecycle Event, One Chained Record
//!
//! Runs the full pipeline for a registration or cancellation:
//!
//! ```text
//! build ─▶ validate ─┬─ lock issuer ─▶ resolve head ─▶ link + hash ─▶ render
//!                    │                                                  │
//!                    │      ┌──────────── pre-submit hooks ◀────────────┘
//!                    │      ▼
//!                    │   submit ─▶ persist artifacts ─▶ append to ledger
//!                    └─ unlock ◀───────────────────────────────────────┘
//!                             ▼
//!                      post-submit hooks
//! ```
//!
//! ## Chain Invariant
//!
//! The issuer's lock is held from the head read until the ledger append, so
//! concurrent events for one issuer are serialized and each links to the
//! record persisted before it. The lock has two layers: the engine's
//! in-process [`EntityLocks`] and the ledger's [`ChainLedger::lock_issuer`],
//! which for a file ledger also excludes other processes. Failures before the append leave the head
//! untouched; a failure after the authority accepted the record is a
//! [`ChainError::Persistence`] and is logged with `alert = "fatal"`.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use vf_aeat::{Envelope, SubmissionOutcome, SubmissionResponse, Submitter};
use vf_core::{
    FiscalIdentifier, HashedAt, InvoiceIdentifier, RecordError, RecordHash, RecordKind, TaxId,
};
use vf_crypto::{ArtifactKey, ArtifactStore};
use vf_record::{
    BreakdownDefaults, ComputerSystem, Draft, InvoiceSnapshot, PreviousRecord, Record, RecordBody,
};

use crate::audit::IntegrityVerifier;
use crate::error::ChainError;
use crate::hooks::{Hooks, PostSubmitContext, PreSubmitContext, PreSubmitDecision};
use crate::ledger::{ChainEntry, ChainLedger, LedgerError};
use crate::lifecycle::{guard, Decision, LifecycleAction};
use crate::locks::EntityLocks;

/// Static engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// The issuing entity this engine records for.
    pub issuer: FiscalIdentifier,
    /// Third party submitting on the issuer's behalf.
    #[serde(default)]
    pub representative: Option<FiscalIdentifier>,
    /// Descriptor of this software installation.
    pub system: ComputerSystem,
    /// Codes for snapshot lines that carry none.
    #[serde(default)]
    pub defaults: BreakdownDefaults,
}

/// Outcome of a persisted lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// The ledger entry, including any warning from the authority.
    pub entry: ChainEntry,
    /// Public copy of the submitted envelope.
    pub artifact: PathBuf,
    /// Pre-submission hook that supplied the response instead of the network.
    pub short_circuited_by: Option<String>,
    /// Failures reported by post-submission hooks.
    pub hook_errors: Vec<String>,
}

impl SubmissionReceipt {
    /// The persisted record.
    pub fn record(&self) -> &Record {
        &self.entry.record
    }

    /// Warning code and message, if the authority flagged an anomaly.
    pub fn warning(&self) -> Option<(&str, &str)> {
        match &self.entry.outcome {
            SubmissionOutcome::AcceptedWithWarnings { code, message } => {
                Some((code.as_str(), message.as_str()))
            }
            SubmissionOutcome::Accepted => None,
        }
    }
}

type Clock = Box<dyn Fn() -> HashedAt + Send + Sync>;

/// The record chain engine for one issuing entity.
pub struct ChainEngine<L, S> {
    settings: EngineSettings,
    ledger: L,
    store: ArtifactStore,
    submitter: S,
    locks: EntityLocks,
    hooks: Hooks,
    clock: Clock,
}

impl<L: ChainLedger, S: Submitter> ChainEngine<L, S> {
    /// Create an engine.
    ///
    /// # Errors
    ///
    /// [`ChainError::Record`] if the issuer or system descriptor is invalid.
    pub fn new(
        settings: EngineSettings,
        ledger: L,
        store: ArtifactStore,
        submitter: S,
    ) -> Result<Self, ChainError> {
        settings.issuer.validate("issuer")?;
        if let Some(rep) = &settings.representative {
            rep.validate("representative")?;
        }
        settings.system.validate()?;
        Ok(Self {
            settings,
            ledger,
            store,
            submitter,
            locks: EntityLocks::new(),
            hooks: Hooks::new(),
            clock: Box::new(HashedAt::now),
        })
    }

    /// Install extension hooks.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: impl Fn() -> HashedAt + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Static configuration.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The artifact store.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// The submitter.
    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// Reference to the issuer's last persisted record, or `None` for a
    /// chain that has not started.
    ///
    /// Outside the issuer's lock this is only a snapshot; the pipeline
    /// re-reads it under the lock.
    pub fn resolve_predecessor(&self, issuer: &TaxId) -> Result<Option<PreviousRecord>, ChainError> {
        let head = self.ledger.head(issuer).map_err(|e| lookup(issuer, e))?;
        Ok(head.map(|h| h.record.as_predecessor()))
    }

    /// Dispatch a host action through the lifecycle guard.
    ///
    /// Returns `Ok(None)` when the action does not touch the chain.
    pub fn handle(
        &self,
        action: LifecycleAction,
        snapshot: &InvoiceSnapshot,
    ) -> Result<Option<SubmissionReceipt>, ChainError> {
        match guard(action, snapshot) {
            Decision::Register => self.register(snapshot).map(Some),
            Decision::Cancel => self.cancel(snapshot).map(Some),
            Decision::Skip => Ok(None),
            Decision::Deny(reason) => Err(ChainError::Denied(reason)),
        }
    }

    /// Record the issuance of the invoice in `snapshot`.
    pub fn register(&self, snapshot: &InvoiceSnapshot) -> Result<SubmissionReceipt, ChainError> {
        let body = RecordBody::Registration(snapshot.to_registration(&self.settings.defaults)?);
        self.submit_body(body, Some(snapshot))
    }

    /// Record the cancellation of the invoice in `snapshot`.
    pub fn cancel(&self, snapshot: &InvoiceSnapshot) -> Result<SubmissionReceipt, ChainError> {
        let body = RecordBody::Cancellation(snapshot.to_cancellation());
        self.submit_body(body, Some(snapshot))
    }

    /// Run the pipeline for an already assembled body.
    pub fn submit_body(
        &self,
        body: RecordBody,
        snapshot: Option<&InvoiceSnapshot>,
    ) -> Result<SubmissionReceipt, ChainError> {
        let invoice_id = body.invoice_id().clone();
        let issuer = invoice_id.issuer_id.clone();
        if issuer != self.settings.issuer.tax_id {
            return Err(RecordError::StructuralInvariant(format!(
                "invoice {invoice_id} belongs to {issuer}, engine records for {}",
                self.settings.issuer.tax_id
            ))
            .into());
        }
        let draft = Draft::new(body, self.settings.system.clone())?;
        let kind = draft.kind();

        let lock = self.locks.for_issuer(&issuer);
        let held = lock.lock();
        let ledger_lock = self
            .ledger
            .lock_issuer(&issuer)
            .map_err(|e| lookup(&issuer, e))?;

        let head = self.ledger.head(&issuer).map_err(|e| lookup(&issuer, e))?;
        self.check_existing(&invoice_id, kind)?;

        let record = draft.link(
            head.as_ref().map(|h| h.record.as_predecessor()),
            (self.clock)(),
        )?;
        let envelope = Envelope::new(&self.settings.issuer, &record)
            .with_representative(self.settings.representative.as_ref())
            .render()?;

        let pre = PreSubmitContext {
            record: &record,
            envelope: &envelope,
            snapshot,
        };
        let (response, short_circuited_by) = match self.hooks.run_pre(&pre) {
            PreSubmitDecision::Submit => (self.send(&record, &envelope)?, None),
            PreSubmitDecision::ShortCircuit { hook, response } => {
                tracing::info!(
                    hook = %hook,
                    invoice = %invoice_id,
                    "submission short-circuited by hook"
                );
                (response, Some(hook))
            }
            PreSubmitDecision::Veto { hook, reason } => {
                tracing::warn!(
                    hook = %hook,
                    invoice = %invoice_id,
                    reason = %reason,
                    "submission vetoed; chain head unchanged"
                );
                return Err(ChainError::Vetoed { hook, reason });
            }
        };

        let entry = ChainEntry {
            sequence: head.as_ref().map_or(0, |h| h.sequence + 1),
            record,
            outcome: response.outcome.clone(),
            csv: response.csv.clone(),
            persisted_at: Utc::now(),
        };
        let artifact = self.persist(head.as_ref().map(ChainEntry::hash), &entry, &envelope)?;
        drop(ledger_lock);
        drop(held);

        tracing::info!(
            issuer = issuer.as_str(),
            invoice = %invoice_id,
            kind = %kind,
            sequence = entry.sequence,
            hash = entry.hash().as_str(),
            csv = entry.csv.as_deref().unwrap_or(""),
            "record persisted"
        );

        let hook_errors = self.hooks.run_post(&PostSubmitContext {
            record: &entry.record,
            envelope: &envelope,
            response: &response,
            snapshot,
        });

        Ok(SubmissionReceipt {
            entry,
            artifact,
            short_circuited_by,
            hook_errors,
        })
    }

    /// Re-create the public artifact from its protected copy.
    pub fn republish(
        &self,
        invoice: &InvoiceIdentifier,
        kind: RecordKind,
    ) -> Result<PathBuf, ChainError> {
        let key = ArtifactKey::new(invoice.clone(), kind);
        Ok(self.store.republish_from_source(&key)?)
    }

    /// An integrity verifier over this engine's ledger.
    pub fn verifier(&self, trusted_key: vf_crypto::AuditPublicKey) -> IntegrityVerifier<'_, L> {
        IntegrityVerifier::new(&self.ledger, self.settings.defaults, trusted_key)
    }

    fn check_existing(&self, invoice: &InvoiceIdentifier, kind: RecordKind) -> Result<(), ChainError> {
        let issuer = &invoice.issuer_id;
        let find = |k| self.ledger.find(invoice, k).map_err(|e| lookup(issuer, e));
        let duplicate = || ChainError::Duplicate {
            invoice: invoice.to_string(),
            kind,
        };
        match kind {
            RecordKind::Registration => {
                if find(RecordKind::Registration)?.is_some() {
                    return Err(duplicate());
                }
            }
            RecordKind::Cancellation => {
                if find(RecordKind::Registration)?.is_none() {
                    return Err(ChainError::ChainLookup {
                        issuer: issuer.to_string(),
                        reason: format!("no registration record persisted for invoice {invoice}"),
                    });
                }
                if find(RecordKind::Cancellation)?.is_some() {
                    return Err(duplicate());
                }
            }
        }
        // Left behind by a persist that failed after the artifact write.
        if self.store.contains(&ArtifactKey::new(invoice.clone(), kind)) {
            return Err(ChainError::ChainLookup {
                issuer: issuer.to_string(),
                reason: format!(
                    "a {kind} artifact for invoice {invoice} exists without a ledger entry"
                ),
            });
        }
        Ok(())
    }

    fn send(&self, record: &Record, envelope: &str) -> Result<SubmissionResponse, ChainError> {
        match self.submitter.submit(envelope) {
            Ok(response) => {
                if let SubmissionOutcome::AcceptedWithWarnings { code, message } = &response.outcome {
                    tracing::warn!(
                        invoice = %record.invoice_id(),
                        code = %code,
                        message = %message,
                        "record accepted with warnings"
                    );
                }
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(
                    submitter = self.submitter.submitter_name(),
                    invoice = %record.invoice_id(),
                    retriable = e.is_retriable(),
                    error = %e,
                    "submission failed; chain head unchanged"
                );
                Err(e.into())
            }
        }
    }

    fn persist(
        &self,
        expected_head: Option<&RecordHash>,
        entry: &ChainEntry,
        envelope: &str,
    ) -> Result<PathBuf, ChainError> {
        let id = entry.record.invoice_id();
        let fatal = |reason: String| {
            tracing::error!(
                alert = "fatal",
                invoice = %id,
                hash = entry.hash().as_str(),
                reason = %reason,
                "accepted record could not be persisted"
            );
            ChainError::Persistence {
                invoice: id.to_string(),
                hash: entry.hash().as_str().to_string(),
                reason,
            }
        };

        let key = ArtifactKey::new(id.clone(), entry.kind());
        self.store
            .write_if_absent(&key, envelope.as_bytes())
            .map_err(|e| fatal(e.to_string()))?;
        self.ledger
            .append(expected_head, entry.clone())
            .map_err(|e| fatal(e.to_string()))?;
        Ok(self.store.public_path(&key))
    }
}

fn lookup(issuer: &TaxId, e: LedgerError) -> ChainError {
    ChainError::ChainLookup {
        issuer: issuer.to_string(),
        reason: e.to_string(),
    }
}
