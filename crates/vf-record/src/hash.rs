//! # Hash Payloads — Chain Fingerprint Input
//!
//! The fingerprint of a record is the uppercase SHA-256 of a literal
//! `key=value&key=value` string whose keys and order are fixed per record
//! kind:
//!
//! ```text
//! registration: IDEmisorFactura, NumSerieFactura, FechaExpedicionFactura,
//!               TipoFactura, CuotaTotal, ImporteTotal, Huella,
//!               FechaHoraHusoGenRegistro
//! cancellation: IDEmisorFacturaAnulada, NumSerieFacturaAnulada,
//!               FechaExpedicionFacturaAnulada, Huella,
//!               FechaHoraHusoGenRegistro
//! ```
//!
//! Values are inserted verbatim. No URL or XML escaping is applied, even
//! when an invoice number contains `&` or `=`. `Huella` is the predecessor's
//! 64-character chain reference, or empty for a genesis record.

use vf_core::{HashedAt, RecordHash};

use crate::model::{PreviousRecord, RecordBody};

/// The exact text a record fingerprint is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPayload(String);

impl HashPayload {
    /// Build the payload for `body` at chain position `previous`.
    pub fn new(body: &RecordBody, previous: Option<&PreviousRecord>, hashed_at: &HashedAt) -> Self {
        let huella = previous.map(|p| p.hash.as_str()).unwrap_or("");
        let ts = hashed_at.to_iso8601();
        let payload = match body {
            RecordBody::Registration(r) => {
                let id = &r.invoice_id;
                format!(
                    "IDEmisorFactura={}&NumSerieFactura={}&FechaExpedicionFactura={}\
                     &TipoFactura={}&CuotaTotal={}&ImporteTotal={}&Huella={}\
                     &FechaHoraHusoGenRegistro={}",
                    id.issuer_id,
                    id.invoice_number,
                    id.issue_date.to_wire(),
                    r.invoice_type,
                    r.total_tax_amount,
                    r.total_amount,
                    huella,
                    ts,
                )
            }
            RecordBody::Cancellation(c) => {
                let id = &c.invoice_id;
                format!(
                    "IDEmisorFacturaAnulada={}&NumSerieFacturaAnulada={}\
                     &FechaExpedicionFacturaAnulada={}&Huella={}\
                     &FechaHoraHusoGenRegistro={}",
                    id.issuer_id,
                    id.invoice_number,
                    id.issue_date.to_wire(),
                    huella,
                    ts,
                )
            }
        };
        Self(payload)
    }

    /// The payload text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 fingerprint of the payload.
    pub fn digest(&self) -> RecordHash {
        vf_crypto::record_hash(&self.0)
    }
}

impl std::fmt::Display for HashPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
