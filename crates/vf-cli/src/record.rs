//! # Record Subcommands
//!
//! `vf hash` and `vf render` work on a stored record (JSON, as kept in the
//! ledger) without touching the network.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use vf_aeat::Envelope;
use vf_record::Record;

use crate::config::EngineConfig;
use crate::read_json;

/// Arguments for `vf hash`.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// Record JSON file.
    #[arg(long)]
    pub record: PathBuf,
}

/// Arguments for `vf render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Record JSON file.
    #[arg(long)]
    pub record: PathBuf,
}

/// Print the recomputed hash. Exit 1 if it differs from the stored one.
pub fn run_hash(args: &HashArgs) -> Result<u8> {
    let record: Record = read_json(&args.record)?;
    let recomputed = record.calculate_hash();
    println!("  invoice:    {}", record.invoice_id());
    println!("  kind:       {}", record.kind());
    println!("  stored:     {}", record.hash());
    println!("  recomputed: {recomputed}");
    if &recomputed == record.hash() {
        println!("  status:     MATCH");
        Ok(0)
    } else {
        eprintln!("  status:     MISMATCH");
        Ok(1)
    }
}

/// Print the SOAP envelope for a record.
pub fn run_render(args: &RenderArgs, config_path: &Path) -> Result<u8> {
    let config = EngineConfig::load(config_path)?;
    let record: Record = read_json(&args.record)?;
    let xml = Envelope::new(&config.issuer, &record)
        .with_representative(config.representative.as_ref())
        .render()
        .context("rendering envelope")?;
    println!("{xml}");
    Ok(0)
}
