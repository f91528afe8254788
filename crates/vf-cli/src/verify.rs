//! # Verify Subcommand
//!
//! `vf verify --audit <entry.json>` re-derives a record from a signed
//! audit entry and compares it with the ledger. Exit code 0 only on a
//! match.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use vf_chain::audit::read_entry;
use vf_chain::{FileLedger, IntegrityVerifier, VerificationResult};

use crate::config::EngineConfig;

/// Arguments for `vf verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Audit entry JSON file.
    #[arg(long)]
    pub audit: PathBuf,
}

/// Verify one audit entry and print the verdict as JSON.
pub fn run_verify(args: &VerifyArgs, config_path: &Path) -> Result<u8> {
    let config = EngineConfig::load(config_path)?;
    let trusted = config.trusted_key()?;
    let bytes = std::fs::read(&args.audit)
        .with_context(|| format!("reading {}", args.audit.display()))?;
    let entry = read_entry(&args.audit, &bytes)?;
    let ledger = FileLedger::open(config.ledger_dir()).context("opening ledger")?;

    let result = IntegrityVerifier::new(&ledger, config.defaults, trusted)
        .verify(&entry)
        .context("verifying audit entry")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(exit_code(&result))
}

fn exit_code(result: &VerificationResult) -> u8 {
    if result.is_match() {
        0
    } else {
        1
    }
}
