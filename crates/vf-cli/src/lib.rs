//! # vf-cli — Operator Tool for the Record Chain
//!
//! Provides the `vf` command-line interface over file-backed stores and
//! the `vf.yaml` configuration.
//!
//! ## Subcommands
//!
//! - `vf hash` — Recompute a stored record's hash.
//! - `vf render` — Print the envelope a record would be submitted in.
//! - `vf register` / `vf cancel` — Run a lifecycle event end to end.
//! - `vf verify` — Re-derive a record from a signed audit entry.
//! - `vf republish` — Restore a public artifact from its protected copy.
//! - `vf check` — Report unmet setup preconditions.
//!
//! Every handler returns the process exit code; errors bubble up as
//! `anyhow::Error` and are logged once by `main`.

pub mod check;
pub mod config;
pub mod record;
pub mod republish;
pub mod submit;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Exit code for a failure that is safe to retry.
pub const EXIT_RETRY: u8 = 75;

/// Read and decode a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing JSON: {}", path.display()))
}
