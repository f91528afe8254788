//! # Republish Subcommand
//!
//! Re-creates a public artifact byte-for-byte from its protected copy,
//! after checking the copy against its digest sidecar.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use vf_core::{InvoiceIdentifier, InvoiceNumber, IssueDate, RecordKind, TaxId};
use vf_crypto::{ArtifactKey, ArtifactStore};

use crate::config::EngineConfig;

/// Arguments for `vf republish`.
#[derive(Args, Debug)]
pub struct RepublishArgs {
    /// Issuer tax id.
    #[arg(long)]
    pub issuer: String,
    /// Invoice series and number.
    #[arg(long)]
    pub number: String,
    /// Issue date, `dd-mm-yyyy`.
    #[arg(long)]
    pub issue_date: String,
    /// `registration` or `cancellation`.
    #[arg(long)]
    pub kind: RecordKind,
}

/// Restore one public artifact.
pub fn run_republish(args: &RepublishArgs, config_path: &Path) -> Result<u8> {
    let config = EngineConfig::load(config_path)?;
    let invoice = InvoiceIdentifier::new(
        TaxId::new(&args.issuer).context("parsing --issuer")?,
        InvoiceNumber::new(&args.number).context("parsing --number")?,
        IssueDate::parse_wire(&args.issue_date).context("parsing --issue-date")?,
    );
    let key = ArtifactKey::new(invoice, args.kind);
    let path = ArtifactStore::new(config.artifact_dir())
        .republish_from_source(&key)
        .context("republishing artifact")?;
    tracing::info!(path = %path.display(), "artifact republished");
    println!("{}", path.display());
    Ok(0)
}
