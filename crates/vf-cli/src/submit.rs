//! # Submission Subcommands
//!
//! `vf register` and `vf cancel` pass one host action (validating or
//! cancelling the invoice in the snapshot) through the lifecycle guard and,
//! when the guard asks for a record, through the chain engine: file ledger,
//! artifact store and the mutual-TLS client. When
//! `VERIFACTU_AUDIT_SEED` is set, every persisted record's snapshot is also
//! signed into the audit log.
//!
//! ## Exit codes
//!
//! | Code | Meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | Record persisted, or the action needs no record    |
//! | 1    | Any non-retriable failure                          |
//! | 75   | Transport failure; the chain head did not move     |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use vf_aeat::{HttpSubmitter, SubmissionOutcome, Submitter};
use vf_chain::{
    AuditLog, AuditRecorder, ChainEngine, FileLedger, Hooks, LifecycleAction, SubmissionReceipt,
};
use vf_core::{RecordHash, RecordKind};
use vf_crypto::ArtifactStore;
use vf_record::InvoiceSnapshot;

use crate::config::{audit_key_from_env, EngineConfig};
use crate::{read_json, EXIT_RETRY};

/// Arguments for `vf register` and `vf cancel`.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Invoice snapshot JSON file.
    #[arg(long)]
    pub invoice: PathBuf,
}

/// Printed on success.
#[derive(Debug, Serialize)]
pub struct ReceiptView<'a> {
    pub invoice: String,
    pub kind: RecordKind,
    pub sequence: u64,
    pub hash: &'a RecordHash,
    pub csv: Option<&'a str>,
    pub outcome: &'a SubmissionOutcome,
    pub artifact: &'a Path,
    pub short_circuited_by: Option<&'a str>,
    pub hook_errors: &'a [String],
}

impl<'a> From<&'a SubmissionReceipt> for ReceiptView<'a> {
    fn from(r: &'a SubmissionReceipt) -> Self {
        Self {
            invoice: r.record().invoice_id().to_string(),
            kind: r.entry.kind(),
            sequence: r.entry.sequence,
            hash: r.entry.hash(),
            csv: r.entry.csv.as_deref(),
            outcome: &r.entry.outcome,
            artifact: &r.artifact,
            short_circuited_by: r.short_circuited_by.as_deref(),
            hook_errors: &r.hook_errors,
        }
    }
}

/// `vf register`.
pub fn run_register(args: &SubmitArgs, config_path: &Path) -> Result<u8> {
    run(RecordKind::Registration, args, config_path)
}

/// `vf cancel`.
pub fn run_cancel(args: &SubmitArgs, config_path: &Path) -> Result<u8> {
    run(RecordKind::Cancellation, args, config_path)
}

fn run(kind: RecordKind, args: &SubmitArgs, config_path: &Path) -> Result<u8> {
    let config = EngineConfig::load(config_path)?;
    let snapshot: InvoiceSnapshot = read_json(&args.invoice)?;
    let submitter = HttpSubmitter::new(&config.client).context("building submission client")?;
    execute(&config, kind, &snapshot, submitter)
}

/// Run one event with `submitter` and print the receipt as JSON.
pub fn execute<S: Submitter>(
    config: &EngineConfig,
    kind: RecordKind,
    snapshot: &InvoiceSnapshot,
    submitter: S,
) -> Result<u8> {
    let ledger = FileLedger::open(config.ledger_dir()).context("opening ledger")?;
    let mut hooks = Hooks::new();
    if let Some(key) = audit_key_from_env()? {
        hooks.add_post(AuditRecorder::new(AuditLog::new(config.audit_dir()), key));
    }
    let engine = ChainEngine::new(
        config.settings(),
        ledger,
        ArtifactStore::new(config.artifact_dir()),
        submitter,
    )
    .context("configuring chain engine")?
    .with_hooks(hooks);

    let action = match kind {
        RecordKind::Registration => LifecycleAction::Validate,
        RecordKind::Cancellation => LifecycleAction::Cancel {
            by_replacement: false,
        },
    };
    match engine.handle(action, snapshot) {
        Ok(None) => {
            eprintln!(
                "  invoice {} ({:?}) needs no {kind} record; nothing sent",
                snapshot.number, snapshot.status
            );
            Ok(0)
        }
        Ok(Some(receipt)) => {
            let view = ReceiptView::from(&receipt);
            println!("{}", serde_json::to_string_pretty(&view)?);
            if let Some((code, message)) = receipt.warning() {
                eprintln!("  accepted with warnings [{code}]: {message}");
            }
            for e in &receipt.hook_errors {
                eprintln!("  hook failed: {e}");
            }
            Ok(0)
        }
        Err(e) if e.is_retriable() => {
            eprintln!("  {e}");
            eprintln!("  chain head unchanged; safe to retry");
            Ok(EXIT_RETRY)
        }
        Err(e) => Err(e).with_context(|| format!("{kind} of invoice {} failed", snapshot.number)),
    }
}
