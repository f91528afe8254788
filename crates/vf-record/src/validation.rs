//! # Breakdown & Totals Validator
//!
//! Numeric checks run after the structural ones, and stop at the first
//! failure:
//!
//! 1. every line's tax amount is within tolerance of `base × rate / 100`;
//! 2. the declared total tax equals the sum of line taxes exactly;
//! 3. the declared total amount is within tolerance of
//!    `Σ base + Σ tax`.
//!
//! Tolerance is the five-candidate rule of [`Amount::tolerance_candidates`].

use vf_core::{Amount, RecordError};

use crate::corrective;
use crate::model::{check_text, Registration};

/// Maximum length of an operation description.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Run every check a registration body must pass.
pub fn validate_registration(reg: &Registration) -> Result<(), RecordError> {
    check_text("issuer_name", &reg.issuer_name, 120)?;
    check_text("description", &reg.description, MAX_DESCRIPTION_LEN)?;
    for (i, r) in reg.recipients.iter().enumerate() {
        r.validate(&format!("recipients[{i}]"))?;
    }
    corrective::check(reg)?;
    validate_breakdown(reg)
}

/// Check line taxes and declared totals.
pub fn validate_breakdown(reg: &Registration) -> Result<(), RecordError> {
    if reg.breakdown.is_empty() {
        return Err(RecordError::validation(
            "breakdown",
            "must contain at least one line",
        ));
    }

    for (i, line) in reg.breakdown.iter().enumerate() {
        let expected = line.tax_rate.tax_on(line.base_amount);
        if !line.tax_amount.within_tolerance_of(expected) {
            return Err(RecordError::validation(
                format!("breakdown[{i}].tax_amount"),
                format!(
                    "expected tax amount of {}, got {}",
                    Amount::from_decimal(expected),
                    line.tax_amount
                ),
            ));
        }
    }

    let (base_total, tax_total) = line_totals(reg);
    if reg.total_tax_amount != tax_total {
        return Err(RecordError::validation(
            "total_tax_amount",
            format!(
                "expected total tax amount of {tax_total}, got {}",
                reg.total_tax_amount
            ),
        ));
    }

    let expected_total = (base_total + tax_total).as_decimal();
    if !reg.total_amount.within_tolerance_of(expected_total) {
        return Err(RecordError::validation(
            "total_amount",
            format!(
                "expected total amount of {}, got {}",
                base_total + tax_total,
                reg.total_amount
            ),
        ));
    }
    Ok(())
}

/// Sum of line bases and sum of line taxes.
pub fn line_totals(reg: &Registration) -> (Amount, Amount) {
    let base = reg.breakdown.iter().map(|l| l.base_amount).sum();
    let tax = reg.breakdown.iter().map(|l| l.tax_amount).sum();
    (base, tax)
}
