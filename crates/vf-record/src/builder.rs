//! # Registration Builder
//!
//! Fluent construction of a [`Registration`]. Totals are derived from the
//! breakdown unless declared explicitly, in which case the declared values
//! are validated as-is. `build()` runs the full validation suite, so a
//! builder never yields a body that [`Draft::new`](crate::Draft::new) would
//! reject.

use vf_core::{
    Amount, CorrectiveType, InvoiceIdentifier, InvoiceType, Recipient, RecordError,
};

use crate::model::{BreakdownLine, CorrectedAmounts, Registration};
use crate::validation::{line_totals, validate_registration};

/// Builder for registration bodies.
#[derive(Debug, Clone)]
pub struct RegistrationBuilder {
    invoice_id: InvoiceIdentifier,
    issuer_name: String,
    invoice_type: InvoiceType,
    description: Option<String>,
    recipients: Vec<Recipient>,
    corrective_type: Option<CorrectiveType>,
    corrected_invoices: Vec<InvoiceIdentifier>,
    corrected_amounts: Option<CorrectedAmounts>,
    replaced_invoices: Vec<InvoiceIdentifier>,
    breakdown: Vec<BreakdownLine>,
    declared_totals: Option<(Amount, Amount)>,
}

impl RegistrationBuilder {
    /// Start a registration for `invoice_id`.
    pub fn new(
        invoice_id: InvoiceIdentifier,
        issuer_name: impl Into<String>,
        invoice_type: InvoiceType,
    ) -> Self {
        Self {
            invoice_id,
            issuer_name: issuer_name.into(),
            invoice_type,
            description: None,
            recipients: Vec::new(),
            corrective_type: None,
            corrected_invoices: Vec::new(),
            corrected_amounts: None,
            replaced_invoices: Vec::new(),
            breakdown: Vec::new(),
            declared_totals: None,
        }
    }

    /// Set the operation description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a recipient.
    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Mark the invoice as a correction of `corrected`.
    pub fn corrects(
        mut self,
        corrective_type: CorrectiveType,
        corrected: impl IntoIterator<Item = InvoiceIdentifier>,
    ) -> Self {
        self.corrective_type = Some(corrective_type);
        self.corrected_invoices.extend(corrected);
        self
    }

    /// Restated amounts for a substitution correction.
    pub fn corrected_amounts(mut self, base: Amount, tax: Amount) -> Self {
        self.corrected_amounts = Some(CorrectedAmounts { base, tax });
        self
    }

    /// Add a replaced simplified invoice.
    pub fn replaces(mut self, invoice: InvoiceIdentifier) -> Self {
        self.replaced_invoices.push(invoice);
        self
    }

    /// Add a breakdown line.
    pub fn line(mut self, line: BreakdownLine) -> Self {
        self.breakdown.push(line);
        self
    }

    /// Declare totals instead of deriving them.
    pub fn totals(mut self, total_tax_amount: Amount, total_amount: Amount) -> Self {
        self.declared_totals = Some((total_tax_amount, total_amount));
        self
    }

    /// Assemble and validate.
    ///
    /// # Errors
    ///
    /// [`RecordError::IncompleteSourceData`] if no description was given,
    /// otherwise the first failing validation.
    pub fn build(self) -> Result<Registration, RecordError> {
        let description = self.description.ok_or_else(|| {
            RecordError::IncompleteSourceData("registration requires a description".into())
        })?;
        let mut reg = Registration {
            invoice_id: self.invoice_id,
            issuer_name: self.issuer_name.trim().to_string(),
            invoice_type: self.invoice_type,
            description,
            recipients: self.recipients,
            corrective_type: self.corrective_type,
            corrected_invoices: self.corrected_invoices,
            corrected_amounts: self.corrected_amounts,
            replaced_invoices: self.replaced_invoices,
            breakdown: self.breakdown,
            total_tax_amount: Amount::zero(),
            total_amount: Amount::zero(),
        };
        let (tax, total) = match self.declared_totals {
            Some(declared) => declared,
            None => {
                let (base, tax) = line_totals(&reg);
                (tax, base + tax)
            }
        };
        reg.total_tax_amount = tax;
        reg.total_amount = total;
        validate_registration(&reg)?;
        Ok(reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{corrected_ref, invoice_id, line, recipient};

    #[test]
    fn derives_totals_from_lines() {
        let reg = RegistrationBuilder::new(invoice_id("FA-001"), "Emisor SL", InvoiceType::F1)
            .description("Servicios")
            .recipient(recipient())
            .line(line("100.00", "21.00", "21.00"))
            .line(line("50.00", "10.00", "5.00"))
            .build()
            .unwrap();
        assert_eq!(reg.total_tax_amount.to_string(), "26.00");
        assert_eq!(reg.total_amount.to_string(), "176.00");
    }

    #[test]
    fn declared_totals_are_validated() {
        let err = RegistrationBuilder::new(invoice_id("FA-001"), "Emisor SL", InvoiceType::F1)
            .description("Servicios")
            .line(line("100.00", "21.00", "21.00"))
            .totals(Amount::parse("21.00").unwrap(), Amount::parse("125.00").unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, RecordError::Validation { ref path, .. } if path == "total_amount"));
    }

    #[test]
    fn missing_description_is_incomplete() {
        let err = RegistrationBuilder::new(invoice_id("FA-001"), "Emisor SL", InvoiceType::F1)
            .line(line("100.00", "21.00", "21.00"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RecordError::IncompleteSourceData(_)));
    }

    #[test]
    fn substitution_correction() {
        let reg = RegistrationBuilder::new(invoice_id("FA-002"), "Emisor SL", InvoiceType::R1)
            .description("Rectifica FA-000")
            .recipient(recipient())
            .corrects(CorrectiveType::Substitution, [corrected_ref()])
            .corrected_amounts(Amount::parse("100.00").unwrap(), Amount::parse("21.00").unwrap())
            .line(line("80.00", "21.00", "16.80"))
            .build()
            .unwrap();
        assert_eq!(reg.corrected_invoices.len(), 1);
        assert_eq!(reg.total_amount.to_string(), "96.80");
    }
}
