//! Shared fixtures for unit tests.

use vf_core::{
    Amount, FiscalIdentifier, InvoiceIdentifier, InvoiceNumber, InvoiceType, IssueDate,
    OperationType, Recipient, RegimeCode, TaxId, TaxRate, TaxType,
};

use crate::model::{BreakdownLine, ComputerSystem, Registration};

pub(crate) fn invoice_id(number: &str) -> InvoiceIdentifier {
    InvoiceIdentifier::new(
        TaxId::new("B12345678").unwrap(),
        InvoiceNumber::new(number).unwrap(),
        IssueDate::from_ymd(2024, 5, 1).unwrap(),
    )
}

pub(crate) fn corrected_ref() -> InvoiceIdentifier {
    InvoiceIdentifier::new(
        TaxId::new("B12345678").unwrap(),
        InvoiceNumber::new("FA-000").unwrap(),
        IssueDate::from_ymd(2024, 4, 2).unwrap(),
    )
}

pub(crate) fn recipient() -> Recipient {
    Recipient::Domestic(
        FiscalIdentifier::new("Cliente SA", TaxId::new("A39200019").unwrap()).unwrap(),
    )
}

pub(crate) fn line(base: &str, rate: &str, tax: &str) -> BreakdownLine {
    BreakdownLine {
        tax_type: TaxType::Iva,
        regime: Some(RegimeCode::GENERAL),
        operation: OperationType::S1,
        tax_rate: TaxRate::parse(rate).unwrap(),
        base_amount: Amount::parse(base).unwrap(),
        tax_amount: Amount::parse(tax).unwrap(),
    }
}

/// Two lines, 100.00 at 21% and 50.00 at 10%.
pub(crate) fn registration_a() -> Registration {
    Registration {
        invoice_id: invoice_id("FA-001"),
        issuer_name: "Emisor SL".into(),
        invoice_type: InvoiceType::F1,
        description: "Factura FA-001".into(),
        recipients: vec![recipient()],
        corrective_type: None,
        corrected_invoices: vec![],
        corrected_amounts: None,
        replaced_invoices: vec![],
        breakdown: vec![line("100.00", "21.00", "21.00"), line("50.00", "10.00", "5.00")],
        total_tax_amount: Amount::parse("26.00").unwrap(),
        total_amount: Amount::parse("176.00").unwrap(),
    }
}

pub(crate) fn system() -> ComputerSystem {
    ComputerSystem {
        vendor: FiscalIdentifier::new("Software SL", TaxId::new("B87654321").unwrap()).unwrap(),
        name: "vf".into(),
        id: "VF".into(),
        version: "0.1.0".into(),
        installation_number: "1".into(),
        only_supports_verifactu: true,
        supports_multiple_taxpayers: false,
        has_multiple_taxpayers: false,
    }
}
