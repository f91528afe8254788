//! # Invoice Snapshot — Host Data to Record Bodies
//!
//! The host ERP owns invoices. The engine only sees an `InvoiceSnapshot`, a
//! serializable capture of what it needs, and maps it to a record body.
//!
//! ## Classification
//!
//! | Host kind               | Invoice type | Corrective type |
//! |-------------------------|--------------|-----------------|
//! | `Standard`, `Deposit`   | F1           | none            |
//! | `Simplified`            | F2           | none            |
//! | `SimplifiedSubstitute`  | F3           | none            |
//! | `Replacement`           | R1           | S               |
//! | `CreditNote`            | R1           | I               |
//! | `SimplifiedCreditNote`  | R5           | I               |
//!
//! Corrective kinds must carry their source invoice. Substitutions restate
//! the source's base and tax totals as corrected amounts.

use serde::{Deserialize, Serialize};
use vf_core::{
    Amount, CorrectiveType, CountryCode, FiscalIdentifier, ForeignFiscalIdentifier,
    ForeignIdType, InvoiceIdentifier, InvoiceNumber, InvoiceType, IssueDate, OperationType,
    Recipient, RecordError, RegimeCode, TaxId, TaxRate, TaxType,
};

use crate::builder::RegistrationBuilder;
use crate::model::{BreakdownLine, Cancellation, Registration};

/// How the host classifies an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostInvoiceKind {
    /// Ordinary invoice.
    Standard,
    /// Down-payment invoice.
    Deposit,
    /// Invoice replacing an earlier one in full.
    Replacement,
    /// Credit note against an earlier invoice.
    CreditNote,
    /// Simplified invoice (ticket).
    Simplified,
    /// Credit note against a simplified invoice.
    SimplifiedCreditNote,
    /// Full invoice issued in place of simplified ones.
    SimplifiedSubstitute,
}

impl HostInvoiceKind {
    /// Regulated type and correction mode for this kind.
    pub fn classify(&self) -> (InvoiceType, Option<CorrectiveType>) {
        match self {
            Self::Standard | Self::Deposit => (InvoiceType::F1, None),
            Self::Simplified => (InvoiceType::F2, None),
            Self::SimplifiedSubstitute => (InvoiceType::F3, None),
            Self::Replacement => (InvoiceType::R1, Some(CorrectiveType::Substitution)),
            Self::CreditNote => (InvoiceType::R1, Some(CorrectiveType::Differences)),
            Self::SimplifiedCreditNote => (InvoiceType::R5, Some(CorrectiveType::Differences)),
        }
    }
}

/// Host-side invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Editable, not yet issued.
    Draft,
    /// Issued.
    Validated,
    /// Issued and settled.
    Paid,
    /// Issued and abandoned.
    Abandoned,
}

impl InvoiceStatus {
    /// True once the invoice has been issued.
    pub fn is_issued(&self) -> bool {
        !matches!(self, Self::Draft)
    }
}

/// Counterparty data as the host stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdParty {
    /// Legal name.
    pub name: String,
    /// Spanish tax id, if any.
    #[serde(default)]
    pub tax_id: Option<String>,
    /// ISO country code; absent or `ES` means domestic.
    #[serde(default)]
    pub country: Option<String>,
    /// Foreign document number.
    #[serde(default)]
    pub foreign_id: Option<String>,
    /// Foreign document kind; defaults to "other document".
    #[serde(default)]
    pub foreign_id_type: Option<ForeignIdType>,
}

impl ThirdParty {
    fn is_domestic(&self) -> bool {
        self.country
            .as_deref()
            .map(|c| c.trim().eq_ignore_ascii_case("ES"))
            .unwrap_or(true)
    }

    /// The identifier shown in default descriptions.
    pub fn display_id(&self) -> &str {
        self.tax_id
            .as_deref()
            .or(self.foreign_id.as_deref())
            .unwrap_or("")
    }

    /// Build a recipient from whichever identifier is usable.
    ///
    /// # Errors
    ///
    /// [`RecordError::IncompleteSourceData`] if no identifier is usable,
    /// [`RecordError::InvalidIdentifier`] if one is present but malformed.
    pub fn to_recipient(&self) -> Result<Recipient, RecordError> {
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        if self.is_domestic() {
            let tax_id = non_blank(&self.tax_id).ok_or_else(|| {
                RecordError::IncompleteSourceData(format!(
                    "domestic recipient {:?} has no tax id",
                    self.name
                ))
            })?;
            return Ok(Recipient::Domestic(FiscalIdentifier::new(
                &self.name,
                TaxId::new(tax_id)?,
            )?));
        }
        let country = non_blank(&self.country).ok_or_else(|| {
            RecordError::IncompleteSourceData(format!("recipient {:?} has no country", self.name))
        })?;
        let value = non_blank(&self.foreign_id)
            .or_else(|| non_blank(&self.tax_id))
            .ok_or_else(|| {
                RecordError::IncompleteSourceData(format!(
                    "foreign recipient {:?} lacks any usable identifier",
                    self.name
                ))
            })?;
        Ok(Recipient::Foreign(ForeignFiscalIdentifier::new(
            &self.name,
            CountryCode::new(country)?,
            self.foreign_id_type.unwrap_or(ForeignIdType::Other),
            value,
        )?))
    }
}

/// One invoice line as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    /// Taxable base.
    pub base_amount: Amount,
    /// Rate in percent.
    pub tax_rate: TaxRate,
    /// Tax charged, including any local surcharges.
    pub tax_amount: Amount,
    /// Overrides the default tax type.
    #[serde(default)]
    pub tax_type: Option<TaxType>,
    /// Overrides the default regime key.
    #[serde(default)]
    pub regime: Option<RegimeCode>,
    /// Overrides the default operation qualification.
    #[serde(default)]
    pub operation: Option<OperationType>,
}

/// The invoice a corrective invoice amends, with its totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedSource {
    /// Identity of the source invoice.
    pub invoice_id: InvoiceIdentifier,
    /// Its total taxable base.
    pub base_amount: Amount,
    /// Its total tax.
    pub tax_amount: Amount,
}

/// Codes applied to lines that do not carry their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownDefaults {
    /// Default tax type.
    pub tax_type: TaxType,
    /// Default regime key.
    pub regime: Option<RegimeCode>,
    /// Default operation qualification.
    pub operation: OperationType,
}

impl Default for BreakdownDefaults {
    fn default() -> Self {
        Self {
            tax_type: TaxType::Iva,
            regime: Some(RegimeCode::GENERAL),
            operation: OperationType::S1,
        }
    }
}

/// Everything the engine needs to know about a host invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    /// Host-side reference, used only in logs.
    pub host_ref: String,
    /// Issuing party.
    pub issuer: FiscalIdentifier,
    /// Invoice series and number.
    pub number: InvoiceNumber,
    /// Date of issue.
    pub issue_date: IssueDate,
    /// Host classification.
    pub kind: HostInvoiceKind,
    /// Host status.
    pub status: InvoiceStatus,
    /// Counterparty, absent for anonymous simplified invoices.
    #[serde(default)]
    pub third_party: Option<ThirdParty>,
    /// Invoice lines.
    pub lines: Vec<SnapshotLine>,
    /// Explicit description; a default is generated when absent.
    #[serde(default)]
    pub description: Option<String>,
    /// Source invoice for corrective kinds.
    #[serde(default)]
    pub corrected_source: Option<CorrectedSource>,
    /// Simplified invoices replaced by a `SimplifiedSubstitute`.
    #[serde(default)]
    pub replaced_invoices: Vec<InvoiceIdentifier>,
}

impl InvoiceSnapshot {
    /// Identity of this invoice.
    pub fn invoice_id(&self) -> InvoiceIdentifier {
        InvoiceIdentifier::new(
            self.issuer.tax_id.clone(),
            self.number.clone(),
            self.issue_date,
        )
    }

    fn default_description(&self) -> String {
        match &self.third_party {
            Some(tp) => format!(
                "Factura {} a {} ({})",
                self.number,
                tp.display_id(),
                tp.name
            ),
            None => format!("Factura {}", self.number),
        }
    }

    /// Map this snapshot to a validated registration body.
    ///
    /// # Errors
    ///
    /// [`RecordError::IncompleteSourceData`] if the invoice has no lines, a
    /// non-simplified invoice has no usable recipient, or a corrective
    /// invoice has no source; otherwise the first failing validation.
    pub fn to_registration(&self, defaults: &BreakdownDefaults) -> Result<Registration, RecordError> {
        let (invoice_type, corrective_type) = self.kind.classify();
        tracing::debug!(
            host_ref = %self.host_ref,
            invoice = %self.number,
            invoice_type = %invoice_type,
            "building registration from snapshot"
        );
        if self.lines.is_empty() {
            return Err(RecordError::IncompleteSourceData(format!(
                "invoice {} has no lines",
                self.number
            )));
        }

        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_description());

        let mut builder = RegistrationBuilder::new(self.invoice_id(), &self.issuer.name, invoice_type)
            .description(description);

        if !invoice_type.is_simplified() {
            let tp = self.third_party.as_ref().ok_or_else(|| {
                RecordError::IncompleteSourceData(format!(
                    "invoice {} of type {invoice_type} has no recipient",
                    self.number
                ))
            })?;
            builder = builder.recipient(tp.to_recipient()?);
        }

        if let Some(ct) = corrective_type {
            let source = self.corrected_source.as_ref().ok_or_else(|| {
                RecordError::IncompleteSourceData(format!(
                    "corrective invoice {} cannot resolve its source invoice",
                    self.number
                ))
            })?;
            builder = builder.corrects(ct, [source.invoice_id.clone()]);
            if ct == CorrectiveType::Substitution {
                builder = builder.corrected_amounts(source.base_amount, source.tax_amount);
            }
        }

        if invoice_type.allows_replaced_invoices() {
            for replaced in &self.replaced_invoices {
                builder = builder.replaces(replaced.clone());
            }
        }

        for line in &self.lines {
            builder = builder.line(BreakdownLine {
                tax_type: line.tax_type.unwrap_or(defaults.tax_type),
                regime: line.regime.or(defaults.regime),
                operation: line.operation.unwrap_or(defaults.operation),
                tax_rate: line.tax_rate,
                base_amount: line.base_amount,
                tax_amount: line.tax_amount,
            });
        }

        builder.build()
    }

    /// Map this snapshot to a cancellation body.
    pub fn to_cancellation(&self) -> Cancellation {
        Cancellation {
            invoice_id: self.invoice_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::corrected_ref;

    fn line(base: &str, rate: &str, tax: &str) -> SnapshotLine {
        SnapshotLine {
            base_amount: Amount::parse(base).unwrap(),
            tax_rate: TaxRate::parse(rate).unwrap(),
            tax_amount: Amount::parse(tax).unwrap(),
            tax_type: None,
            regime: None,
            operation: None,
        }
    }

    fn snapshot(kind: HostInvoiceKind) -> InvoiceSnapshot {
        InvoiceSnapshot {
            host_ref: "INV-7".into(),
            issuer: FiscalIdentifier::new("Emisor SL", TaxId::new("B12345678").unwrap()).unwrap(),
            number: InvoiceNumber::new("FA-007").unwrap(),
            issue_date: IssueDate::from_ymd(2024, 5, 1).unwrap(),
            kind,
            status: InvoiceStatus::Draft,
            third_party: Some(ThirdParty {
                name: "Cliente SA".into(),
                tax_id: Some("A39200019".into()),
                country: None,
                foreign_id: None,
                foreign_id_type: None,
            }),
            lines: vec![line("100.00", "21.00", "21.00"), line("50.00", "10.00", "5.00")],
            description: None,
            corrected_source: None,
            replaced_invoices: vec![],
        }
    }

    #[test]
    fn standard_invoice_maps_to_f1() {
        let reg = snapshot(HostInvoiceKind::Standard)
            .to_registration(&BreakdownDefaults::default())
            .unwrap();
        assert_eq!(reg.invoice_type, InvoiceType::F1);
        assert_eq!(reg.description, "Factura FA-007 a A39200019 (Cliente SA)");
        assert_eq!(reg.recipients.len(), 1);
        assert_eq!(reg.total_amount.to_string(), "176.00");
        assert_eq!(reg.breakdown[0].regime, Some(RegimeCode::GENERAL));
    }

    #[test]
    fn simplified_drops_recipient() {
        let reg = snapshot(HostInvoiceKind::Simplified)
            .to_registration(&BreakdownDefaults::default())
            .unwrap();
        assert_eq!(reg.invoice_type, InvoiceType::F2);
        assert!(reg.recipients.is_empty());
    }

    #[test]
    fn credit_note_without_source_is_incomplete() {
        let err = snapshot(HostInvoiceKind::CreditNote)
            .to_registration(&BreakdownDefaults::default())
            .unwrap_err();
        assert!(matches!(err, RecordError::IncompleteSourceData(_)));
    }

    #[test]
    fn replacement_restates_source_amounts() {
        let mut snap = snapshot(HostInvoiceKind::Replacement);
        snap.corrected_source = Some(CorrectedSource {
            invoice_id: corrected_ref(),
            base_amount: Amount::parse("120.00").unwrap(),
            tax_amount: Amount::parse("25.20").unwrap(),
        });
        let reg = snap.to_registration(&BreakdownDefaults::default()).unwrap();
        assert_eq!(reg.invoice_type, InvoiceType::R1);
        assert_eq!(reg.corrective_type, Some(CorrectiveType::Substitution));
        let amounts = reg.corrected_amounts.unwrap();
        assert_eq!(amounts.base.to_string(), "120.00");
        assert_eq!(reg.corrected_invoices, vec![corrected_ref()]);
    }

    #[test]
    fn credit_note_uses_differences() {
        let mut snap = snapshot(HostInvoiceKind::CreditNote);
        snap.corrected_source = Some(CorrectedSource {
            invoice_id: corrected_ref(),
            base_amount: Amount::parse("150.00").unwrap(),
            tax_amount: Amount::parse("26.00").unwrap(),
        });
        let reg = snap.to_registration(&BreakdownDefaults::default()).unwrap();
        assert_eq!(reg.corrective_type, Some(CorrectiveType::Differences));
        assert!(reg.corrected_amounts.is_none());
    }

    #[test]
    fn foreign_recipient_without_identifier_is_incomplete() {
        let mut snap = snapshot(HostInvoiceKind::Standard);
        snap.third_party = Some(ThirdParty {
            name: "Kunde GmbH".into(),
            tax_id: None,
            country: Some("DE".into()),
            foreign_id: None,
            foreign_id_type: None,
        });
        let err = snap.to_registration(&BreakdownDefaults::default()).unwrap_err();
        assert!(matches!(err, RecordError::IncompleteSourceData(_)));
    }

    #[test]
    fn foreign_recipient_with_vat_number() {
        let mut snap = snapshot(HostInvoiceKind::Standard);
        snap.third_party = Some(ThirdParty {
            name: "Kunde GmbH".into(),
            tax_id: None,
            country: Some("de".into()),
            foreign_id: Some("DE811569869".into()),
            foreign_id_type: Some(ForeignIdType::VatNumber),
        });
        let reg = snap.to_registration(&BreakdownDefaults::default()).unwrap();
        match &reg.recipients[0] {
            Recipient::Foreign(f) => {
                assert_eq!(f.country.as_str(), "DE");
                assert_eq!(f.id_type, ForeignIdType::VatNumber);
            }
            other => panic!("expected foreign recipient, got {other:?}"),
        }
    }

    #[test]
    fn line_overrides_win_over_defaults() {
        let mut snap = snapshot(HostInvoiceKind::Standard);
        snap.lines[1].tax_type = Some(TaxType::Igic);
        snap.lines[1].operation = Some(OperationType::S2);
        let reg = snap.to_registration(&BreakdownDefaults::default()).unwrap();
        assert_eq!(reg.breakdown[0].tax_type, TaxType::Iva);
        assert_eq!(reg.breakdown[1].tax_type, TaxType::Igic);
        assert_eq!(reg.breakdown[1].operation, OperationType::S2);
    }

    #[test]
    fn no_lines_is_incomplete() {
        let mut snap = snapshot(HostInvoiceKind::Standard);
        snap.lines.clear();
        assert!(matches!(
            snap.to_registration(&BreakdownDefaults::default()),
            Err(RecordError::IncompleteSourceData(_))
        ));
    }

    #[test]
    fn snapshot_json_roundtrip() {
        let snap = snapshot(HostInvoiceKind::Deposit);
        let json = serde_json::to_string(&snap).unwrap();
        let back: InvoiceSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
