//! # Engine Configuration — `vf.yaml`
//!
//! One YAML file describes the installation: who issues, which software
//! records, where records are stored, which key signs the audit log, and
//! how to reach the authority.
//!
//! ```yaml
//! issuer: { name: Emisor SL, tax_id: B12345678 }
//! system:
//!   vendor: { name: Software SL, tax_id: B87654321 }
//!   name: vf
//!   id: VF
//!   version: 0.1.0
//!   installation_number: "1"
//!   only_supports_verifactu: true
//!   supports_multiple_taxpayers: false
//!   has_multiple_taxpayers: false
//! storage_root: /var/lib/vf
//! audit_public_key: 5f2c...
//! client:
//!   environment: test
//!   cert_path: /etc/vf/client.p12
//! ```
//!
//! The signing half of the audit key never lives in this file; it is read
//! from [`AUDIT_SEED_ENV`] when present.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vf_aeat::ClientConfig;
use vf_chain::EngineSettings;
use vf_core::FiscalIdentifier;
use vf_crypto::{AuditKeyPair, AuditPublicKey};
use vf_record::{BreakdownDefaults, ComputerSystem};

/// Environment variable holding the hex Ed25519 seed that signs audit
/// entries.
pub const AUDIT_SEED_ENV: &str = "VERIFACTU_AUDIT_SEED";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "vf.yaml";

/// Contents of `vf.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Issuing entity.
    pub issuer: FiscalIdentifier,
    /// Third party submitting on the issuer's behalf.
    #[serde(default)]
    pub representative: Option<FiscalIdentifier>,
    /// This installation's system descriptor.
    pub system: ComputerSystem,
    /// Codes for lines that carry none.
    #[serde(default)]
    pub defaults: BreakdownDefaults,
    /// Directory holding the ledger, artifacts and audit log.
    pub storage_root: PathBuf,
    /// Hex Ed25519 key trusted to sign audit entries.
    #[serde(default)]
    pub audit_public_key: Option<String>,
    /// Submission client settings.
    pub client: ClientConfig,
}

impl EngineConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("parsing configuration YAML: {}", path.display()))
    }

    /// Engine settings derived from this file.
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            issuer: self.issuer.clone(),
            representative: self.representative.clone(),
            system: self.system.clone(),
            defaults: self.defaults,
        }
    }

    /// Per-issuer chain files.
    pub fn ledger_dir(&self) -> PathBuf {
        self.storage_root.join("ledger")
    }

    /// Submitted envelopes.
    pub fn artifact_dir(&self) -> PathBuf {
        self.storage_root.join("artifacts")
    }

    /// Signed invoice snapshots.
    pub fn audit_dir(&self) -> PathBuf {
        self.storage_root.join("audit")
    }

    /// The key trusted to have signed audit entries.
    pub fn trusted_key(&self) -> Result<AuditPublicKey> {
        let hex = self
            .audit_public_key
            .as_deref()
            .context("audit_public_key is not configured")?;
        AuditPublicKey::from_hex(hex).context("parsing audit_public_key")
    }

    /// Every unmet precondition for submitting records. Empty when ready.
    pub fn readiness(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Err(e) = self.issuer.validate("issuer") {
            problems.push(e.to_string());
        }
        if let Some(rep) = &self.representative {
            if let Err(e) = rep.validate("representative") {
                problems.push(e.to_string());
            }
        }
        if let Err(e) = self.system.validate() {
            problems.push(e.to_string());
        }

        let cert = &self.client.cert_path;
        if !cert.is_file() {
            problems.push(format!("client certificate {} does not exist", cert.display()));
        }
        if let Err(e) = self.client.endpoint_url() {
            problems.push(e.to_string());
        }

        match &self.audit_public_key {
            None => problems.push("audit_public_key is not configured".to_string()),
            Some(hex) => {
                if let Err(e) = AuditPublicKey::from_hex(hex) {
                    problems.push(format!("audit_public_key: {e}"));
                }
            }
        }
        problems
    }
}

/// The audit signing key from [`AUDIT_SEED_ENV`], if set.
pub fn audit_key_from_env() -> Result<Option<AuditKeyPair>> {
    match std::env::var(AUDIT_SEED_ENV) {
        Ok(seed) if !seed.trim().is_empty() => AuditKeyPair::from_seed_hex(seed.trim())
            .map(Some)
            .with_context(|| format!("parsing {AUDIT_SEED_ENV}")),
        _ => Ok(None),
    }
}
