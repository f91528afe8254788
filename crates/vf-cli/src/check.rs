//! # Check Subcommand
//!
//! Prints the readiness report for the configured installation.

use std::path::Path;

use anyhow::Result;

use crate::config::EngineConfig;

/// Print the setup summary and any unmet preconditions. Exit 1 if there
/// are any.
pub fn run_check(config_path: &Path) -> Result<u8> {
    let config = EngineConfig::load(config_path)?;
    println!("  issuer:      {} ({})", config.issuer.name, config.issuer.tax_id);
    if let Some(rep) = &config.representative {
        println!("  represented: {} ({})", rep.name, rep.tax_id);
    }
    println!("  system:      {} {}", config.system.name, config.system.version);
    println!("  environment: {:?}", config.client.environment);
    println!("  storage:     {}", config.storage_root.display());

    let problems = config.readiness();
    if problems.is_empty() {
        println!("  status:      READY");
        return Ok(0);
    }
    eprintln!("  status:      NOT READY");
    for p in &problems {
        eprintln!("    - {p}");
    }
    Ok(1)
}
