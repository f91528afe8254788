//! # Corrective-Invoice Rules
//!
//! Which fields a registration may or must carry depends on its invoice type
//! and correction mode:
//!
//! | Field                 | Legal when                               |
//! |-----------------------|------------------------------------------|
//! | `corrective_type`     | required iff the type is R1..R5          |
//! | `corrected_invoices`  | only for R1..R5                          |
//! | `corrected_amounts`   | required iff `corrective_type` is `S`    |
//! | `replaced_invoices`   | only for F3                              |
//! | `recipients`          | must be empty for F2 and R5              |
//!
//! Violations are [`RecordError::StructuralInvariant`]. Nothing is coerced.

use vf_core::{CorrectiveType, RecordError};

use crate::model::Registration;

fn violation(msg: String) -> RecordError {
    RecordError::StructuralInvariant(msg)
}

/// Enforce the field-presence rules for `reg`.
pub fn check(reg: &Registration) -> Result<(), RecordError> {
    let ty = reg.invoice_type;

    match (ty.is_corrective(), reg.corrective_type) {
        (true, None) => {
            return Err(violation(format!(
                "invoice type {ty} is corrective and requires a corrective type"
            )))
        }
        (false, Some(ct)) => {
            return Err(violation(format!(
                "corrective type {ct} is not allowed for invoice type {ty}"
            )))
        }
        _ => {}
    }

    if !ty.is_corrective() && !reg.corrected_invoices.is_empty() {
        return Err(violation(format!(
            "invoice type {ty} cannot list corrected invoices"
        )));
    }

    if ty.is_simplified() && !reg.recipients.is_empty() {
        return Err(violation(format!(
            "simplified invoice type {ty} must not carry recipients"
        )));
    }

    let substitution = reg.corrective_type == Some(CorrectiveType::Substitution);
    match (substitution, reg.corrected_amounts.is_some()) {
        (true, false) => {
            return Err(violation(
                "substitution corrections require corrected base and tax amounts".into(),
            ))
        }
        (false, true) => {
            return Err(violation(
                "corrected amounts are only allowed for substitution corrections".into(),
            ))
        }
        _ => {}
    }

    if !ty.allows_replaced_invoices() && !reg.replaced_invoices.is_empty() {
        return Err(violation(format!(
            "invoice type {ty} cannot list replaced invoices"
        )));
    }

    Ok(())
}
