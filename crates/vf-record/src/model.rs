//! # Record Model — Registration and Cancellation Records
//!
//! A record is a tagged union of a registration body and a cancellation
//! body, plus the chain fields every record shares: the computer-system
//! descriptor, the optional predecessor reference, the hash timestamp and
//! the hash.
//!
//! ## Lifecycle
//!
//! ```text
//! RecordBody ──Draft::new()──▶ Draft ──link(predecessor, hashed_at)──▶ Record
//!               (validates)             (computes hash)
//! ```
//!
//! `Record` has private fields. The only ways to obtain one are
//! [`Draft::link`], [`Record::from_parts`] and deserialization, and all
//! three run the full validation suite. A `Record` value therefore always
//! satisfies the structural and numeric invariants; whether its stored hash
//! matches its fields is checked separately by [`Record::verify_hash`], so
//! that tampered records can still be loaded for inspection.

use serde::{Deserialize, Serialize};
use vf_core::{
    Amount, CorrectiveType, FiscalIdentifier, HashedAt, InvoiceIdentifier, InvoiceType,
    OperationType, Recipient, RecordError, RecordHash, RecordKind, RegimeCode, TaxRate, TaxType,
};

use crate::hash::HashPayload;
use crate::validation;

/// Value of `IDVersion` for every record.
pub const ID_VERSION: &str = "1.0";

/// Value of `TipoHuella` for SHA-256 fingerprints.
pub const HASH_ALGORITHM_SHA256: &str = "01";

/// One taxable base, rate and tax amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownLine {
    /// Tax being declared.
    pub tax_type: TaxType,
    /// Regime key; omitted on the wire when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regime: Option<RegimeCode>,
    /// Operation qualification.
    pub operation: OperationType,
    /// Rate in percent.
    pub tax_rate: TaxRate,
    /// Taxable base.
    pub base_amount: Amount,
    /// Tax charged.
    pub tax_amount: Amount,
}

/// Static description of the invoicing software.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerSystem {
    /// Vendor legal name and tax id.
    pub vendor: FiscalIdentifier,
    /// Product name.
    pub name: String,
    /// Two-character system code assigned by the vendor.
    pub id: String,
    /// Product version.
    pub version: String,
    /// Installation number.
    pub installation_number: String,
    /// The system can only operate in continuous-submission mode.
    pub only_supports_verifactu: bool,
    /// The system can invoice for more than one taxpayer.
    pub supports_multiple_taxpayers: bool,
    /// This installation invoices for more than one taxpayer.
    pub has_multiple_taxpayers: bool,
}

impl ComputerSystem {
    /// Check lengths and formats.
    pub fn validate(&self) -> Result<(), RecordError> {
        self.vendor.validate("system.vendor")?;
        check_text("system.name", &self.name, 30)?;
        check_text("system.version", &self.version, 50)?;
        check_text("system.installation_number", &self.installation_number, 100)?;
        if self.id.is_empty()
            || self.id.len() > 2
            || !self.id.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(RecordError::validation(
                "system.id",
                "must be 1 or 2 alphanumeric characters",
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_text(path: &str, value: &str, max: usize) -> Result<(), RecordError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(RecordError::validation(path, "must not be empty"));
    }
    if len > max {
        return Err(RecordError::validation(
            path,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

/// Reference to the chain head a record follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviousRecord {
    /// Invoice the predecessor record is about.
    pub invoice_id: InvoiceIdentifier,
    /// First 64 characters of the predecessor's hash.
    pub hash: RecordHash,
}

/// Restated amounts of a substitution correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedAmounts {
    /// Restated taxable base.
    pub base: Amount,
    /// Restated tax.
    pub tax: Amount,
}

/// Content of a registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Invoice being registered.
    pub invoice_id: InvoiceIdentifier,
    /// Legal name of the issuer.
    pub issuer_name: String,
    /// Regulated invoice type.
    pub invoice_type: InvoiceType,
    /// Free-text description of the operation.
    pub description: String,
    /// Invoice recipients.
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    /// Correction mode, present exactly for corrective invoice types.
    #[serde(default)]
    pub corrective_type: Option<CorrectiveType>,
    /// Invoices this one corrects.
    #[serde(default)]
    pub corrected_invoices: Vec<InvoiceIdentifier>,
    /// Restated amounts, present exactly for substitution corrections.
    #[serde(default)]
    pub corrected_amounts: Option<CorrectedAmounts>,
    /// Simplified invoices this one replaces.
    #[serde(default)]
    pub replaced_invoices: Vec<InvoiceIdentifier>,
    /// Tax breakdown, at least one line.
    pub breakdown: Vec<BreakdownLine>,
    /// Sum of breakdown tax amounts.
    pub total_tax_amount: Amount,
    /// Invoice total.
    pub total_amount: Amount,
}

/// Content of a cancellation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Invoice being annulled.
    pub invoice_id: InvoiceIdentifier,
}

/// Kind-specific record content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    /// Invoice registration.
    Registration(Registration),
    /// Invoice cancellation.
    Cancellation(Cancellation),
}

impl RecordBody {
    /// The invoice this record is about.
    pub fn invoice_id(&self) -> &InvoiceIdentifier {
        match self {
            Self::Registration(r) => &r.invoice_id,
            Self::Cancellation(c) => &c.invoice_id,
        }
    }

    /// Registration or cancellation.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Registration(_) => RecordKind::Registration,
            Self::Cancellation(_) => RecordKind::Cancellation,
        }
    }

    /// Run the structural and numeric checks for this body.
    pub fn validate(&self) -> Result<(), RecordError> {
        match self {
            Self::Registration(r) => validation::validate_registration(r),
            Self::Cancellation(_) => Ok(()),
        }
    }
}

/// A validated body awaiting its chain position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    body: RecordBody,
    system: ComputerSystem,
}

impl Draft {
    /// Validate `body` and `system` and wrap them.
    ///
    /// # Errors
    ///
    /// The first failing check, as a [`RecordError`].
    pub fn new(body: RecordBody, system: ComputerSystem) -> Result<Self, RecordError> {
        system.validate()?;
        body.validate()?;
        Ok(Self { body, system })
    }

    /// The body.
    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    /// The invoice this draft is about.
    pub fn invoice_id(&self) -> &InvoiceIdentifier {
        self.body.invoice_id()
    }

    /// Registration or cancellation.
    pub fn kind(&self) -> RecordKind {
        self.body.kind()
    }

    /// Fix the draft's chain position and compute its hash.
    ///
    /// # Errors
    ///
    /// [`RecordError::StructuralInvariant`] for a cancellation without a
    /// predecessor: a cancellation can never open a chain.
    pub fn link(
        self,
        predecessor: Option<PreviousRecord>,
        hashed_at: HashedAt,
    ) -> Result<Record, RecordError> {
        let hash = HashPayload::new(&self.body, predecessor.as_ref(), &hashed_at).digest();
        Record::from_parts(self.body, self.system, predecessor, hashed_at, hash)
    }
}

/// A hashed record with a fixed chain position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr", into = "RecordRepr")]
pub struct Record {
    body: RecordBody,
    system: ComputerSystem,
    previous: Option<PreviousRecord>,
    hashed_at: HashedAt,
    hash: RecordHash,
}

#[derive(Serialize, Deserialize)]
struct RecordRepr {
    body: RecordBody,
    system: ComputerSystem,
    previous: Option<PreviousRecord>,
    hashed_at: HashedAt,
    hash: RecordHash,
}

impl TryFrom<RecordRepr> for Record {
    type Error = RecordError;

    fn try_from(r: RecordRepr) -> Result<Self, Self::Error> {
        Record::from_parts(r.body, r.system, r.previous, r.hashed_at, r.hash)
    }
}

impl From<Record> for RecordRepr {
    fn from(r: Record) -> Self {
        Self {
            body: r.body,
            system: r.system,
            previous: r.previous,
            hashed_at: r.hashed_at,
            hash: r.hash,
        }
    }
}

impl Record {
    /// Reassemble a record from stored parts, re-running every check.
    ///
    /// The stored hash is accepted as given; see [`Record::verify_hash`].
    ///
    /// # Errors
    ///
    /// The first failing check, as a [`RecordError`].
    pub fn from_parts(
        body: RecordBody,
        system: ComputerSystem,
        previous: Option<PreviousRecord>,
        hashed_at: HashedAt,
        hash: RecordHash,
    ) -> Result<Self, RecordError> {
        system.validate()?;
        body.validate()?;
        if let Some(prev) = &previous {
            if prev.hash.as_str().len() != vf_core::CHAIN_REFERENCE_LEN {
                return Err(RecordError::StructuralInvariant(
                    "previous hash must be exactly the 64-character chain reference".into(),
                ));
            }
        }
        if matches!(body, RecordBody::Cancellation(_)) && previous.is_none() {
            return Err(RecordError::StructuralInvariant(
                "a cancellation record requires a previous record".into(),
            ));
        }
        Ok(Self {
            body,
            system,
            previous,
            hashed_at,
            hash,
        })
    }

    /// The kind-specific content.
    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    /// Registration or cancellation.
    pub fn kind(&self) -> RecordKind {
        self.body.kind()
    }

    /// The invoice this record is about.
    pub fn invoice_id(&self) -> &InvoiceIdentifier {
        self.body.invoice_id()
    }

    /// The producing software.
    pub fn system(&self) -> &ComputerSystem {
        &self.system
    }

    /// The predecessor, or `None` for a genesis record.
    pub fn previous(&self) -> Option<&PreviousRecord> {
        self.previous.as_ref()
    }

    /// When the hash was computed.
    pub fn hashed_at(&self) -> &HashedAt {
        &self.hashed_at
    }

    /// The stored hash.
    pub fn hash(&self) -> &RecordHash {
        &self.hash
    }

    /// True if this record opens its chain.
    pub fn is_genesis(&self) -> bool {
        self.previous.is_none()
    }

    /// The hash payload derived from the current fields.
    pub fn payload(&self) -> HashPayload {
        HashPayload::new(&self.body, self.previous.as_ref(), &self.hashed_at)
    }

    /// Recompute the hash from the current fields.
    pub fn calculate_hash(&self) -> RecordHash {
        self.payload().digest()
    }

    /// True if the stored hash matches the fields.
    pub fn verify_hash(&self) -> bool {
        self.calculate_hash() == self.hash
    }

    /// The reference a successor record carries.
    pub fn as_predecessor(&self) -> PreviousRecord {
        PreviousRecord {
            invoice_id: self.invoice_id().clone(),
            hash: self.hash.chain_reference(),
        }
    }
}
