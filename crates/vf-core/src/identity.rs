//! # Identity — Tax Identifiers and Invoice Identity
//!
//! Validated newtypes for the parties and invoices that appear in a fiscal
//! record. Construction and deserialization share one validation path, so a
//! value that exists is a value that passed the checks.
//!
//! ## Validation Rules
//!
//! | Type             | Rule                                                |
//! |------------------|-----------------------------------------------------|
//! | `TaxId`          | exactly 9 ASCII alphanumerics, stored uppercase     |
//! | `InvoiceNumber`  | 1..=60 printable characters, no surrounding blanks  |
//! | `CountryCode`    | exactly 2 ASCII letters, stored uppercase           |
//! | foreign id value | 1..=20 printable characters                         |
//! | party name       | 1..=120 characters after trimming                   |

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::codes::ForeignIdType;
use crate::error::RecordError;
use crate::temporal::IssueDate;

/// Maximum length of an invoice number on the wire.
pub const MAX_INVOICE_NUMBER_LEN: usize = 60;

/// Maximum length of a party name on the wire.
pub const MAX_NAME_LEN: usize = 120;

/// Maximum length of a foreign identifier value.
pub const MAX_FOREIGN_ID_LEN: usize = 20;

macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

macro_rules! impl_display_as_str {
    ($ty:ident) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Spanish tax identification number (NIF) of a domestic party.
///
/// Check-letter verification is left to the tax authority; locally only the
/// shape is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaxId(String);

impl_validating_deserialize!(TaxId);
impl_display_as_str!(TaxId);

impl TaxId {
    /// Create a tax id, trimming and upper-casing the input.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidIdentifier`] unless the value is exactly
    /// nine ASCII letters or digits.
    pub fn new(value: impl Into<String>) -> Result<Self, RecordError> {
        let raw = value.into();
        let upper = raw.trim().to_ascii_uppercase();
        if upper.len() != 9 || !upper.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RecordError::InvalidIdentifier(format!(
                "tax id {raw:?} must be 9 alphanumeric characters"
            )));
        }
        Ok(Self(upper))
    }

    /// Access the tax id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Invoice series and number as issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InvoiceNumber(String);

impl_validating_deserialize!(InvoiceNumber);
impl_display_as_str!(InvoiceNumber);

impl InvoiceNumber {
    /// Create an invoice number.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidIdentifier`] if the value is empty, longer
    /// than 60 characters, has surrounding whitespace, or contains control
    /// characters.
    pub fn new(value: impl Into<String>) -> Result<Self, RecordError> {
        let s = value.into();
        if s.is_empty() || s.chars().count() > MAX_INVOICE_NUMBER_LEN {
            return Err(RecordError::InvalidIdentifier(format!(
                "invoice number {s:?} must be 1..={MAX_INVOICE_NUMBER_LEN} characters"
            )));
        }
        if s.trim() != s || s.chars().any(char::is_control) {
            return Err(RecordError::InvalidIdentifier(format!(
                "invoice number {s:?} contains surrounding blanks or control characters"
            )));
        }
        Ok(Self(s))
    }

    /// Access the invoice number string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A filesystem-safe, reversible rendering.
    ///
    /// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, and so is a
    /// leading `.`, so distinct numbers never share a segment.
    pub fn path_segment(&self) -> String {
        let encoded = utf8_percent_encode(&self.0, PATH_SEGMENT).to_string();
        match encoded.strip_prefix('.') {
            Some(rest) => format!("%2E{rest}"),
            None => encoded,
        }
    }
}

/// Everything but unreserved characters, `%` included.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// ISO 3166-1 alpha-2 country code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CountryCode(String);

impl_validating_deserialize!(CountryCode);
impl_display_as_str!(CountryCode);

impl CountryCode {
    /// Create a country code, upper-casing the input.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidIdentifier`] unless the value is two ASCII letters.
    pub fn new(value: impl Into<String>) -> Result<Self, RecordError> {
        let raw = value.into();
        let upper = raw.trim().to_ascii_uppercase();
        if upper.len() != 2 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RecordError::InvalidIdentifier(format!(
                "country code {raw:?} must be 2 letters"
            )));
        }
        Ok(Self(upper))
    }

    /// Access the country code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_name(path: &str, name: &str) -> Result<(), RecordError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RecordError::validation(path, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(RecordError::validation(
            path,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

/// A domestic party: legal name plus tax id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiscalIdentifier {
    /// Legal name or business name.
    pub name: String,
    /// Spanish tax id.
    pub tax_id: TaxId,
}

impl FiscalIdentifier {
    /// Create a domestic party, trimming the name.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Validation`] if the name is empty or too long.
    pub fn new(name: impl Into<String>, tax_id: TaxId) -> Result<Self, RecordError> {
        let name = name.into();
        validate_name("name", &name)?;
        Ok(Self {
            name: name.trim().to_string(),
            tax_id,
        })
    }

    /// Re-check the name after deserialization.
    pub fn validate(&self, path: &str) -> Result<(), RecordError> {
        validate_name(&format!("{path}.name"), &self.name)
    }
}

/// A foreign party identified by country, id type and id value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignFiscalIdentifier {
    /// Legal name or business name.
    pub name: String,
    /// Issuing country.
    pub country: CountryCode,
    /// Kind of document the value refers to.
    pub id_type: ForeignIdType,
    /// The identifier itself.
    pub value: String,
}

impl ForeignFiscalIdentifier {
    /// Create a foreign party.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Validation`] if the name or value is out of range.
    pub fn new(
        name: impl Into<String>,
        country: CountryCode,
        id_type: ForeignIdType,
        value: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let party = Self {
            name: name.into().trim().to_string(),
            country,
            id_type,
            value: value.into().trim().to_string(),
        };
        party.validate("recipient")?;
        Ok(party)
    }

    /// Re-check name and value after deserialization.
    pub fn validate(&self, path: &str) -> Result<(), RecordError> {
        validate_name(&format!("{path}.name"), &self.name)?;
        let len = self.value.chars().count();
        if len == 0 || len > MAX_FOREIGN_ID_LEN {
            return Err(RecordError::validation(
                format!("{path}.value"),
                format!("must be 1..={MAX_FOREIGN_ID_LEN} characters"),
            ));
        }
        if self.value.chars().any(char::is_control) {
            return Err(RecordError::validation(
                format!("{path}.value"),
                "contains control characters",
            ));
        }
        Ok(())
    }
}

/// Invoice recipient: domestic or foreign.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recipient {
    /// Party with a Spanish tax id.
    Domestic(FiscalIdentifier),
    /// Party identified by a foreign document.
    Foreign(ForeignFiscalIdentifier),
}

impl Recipient {
    /// Legal name of the recipient.
    pub fn name(&self) -> &str {
        match self {
            Self::Domestic(p) => &p.name,
            Self::Foreign(p) => &p.name,
        }
    }

    /// The identifier value, whichever kind it is.
    pub fn id_value(&self) -> &str {
        match self {
            Self::Domestic(p) => p.tax_id.as_str(),
            Self::Foreign(p) => &p.value,
        }
    }

    /// Re-check after deserialization.
    pub fn validate(&self, path: &str) -> Result<(), RecordError> {
        match self {
            Self::Domestic(p) => p.validate(path),
            Self::Foreign(p) => p.validate(path),
        }
    }
}

/// Identity of an invoice: issuer, number and issue date.
///
/// Two records about the same invoice share this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceIdentifier {
    /// Tax id of the issuing party.
    pub issuer_id: TaxId,
    /// Series and number.
    pub invoice_number: InvoiceNumber,
    /// Date of issue.
    pub issue_date: IssueDate,
}

impl InvoiceIdentifier {
    /// Assemble an identifier from validated parts.
    pub fn new(issuer_id: TaxId, invoice_number: InvoiceNumber, issue_date: IssueDate) -> Self {
        Self {
            issuer_id,
            invoice_number,
            issue_date,
        }
    }

    /// Storage key for this invoice within its issuer's directory:
    /// `{number}_{yyyymmdd}`, with the number as in
    /// [`InvoiceNumber::path_segment`].
    pub fn path_segment(&self) -> String {
        format!(
            "{}_{}",
            self.invoice_number.path_segment(),
            self.issue_date.as_date().format("%Y%m%d")
        )
    }
}

impl std::fmt::Display for InvoiceIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.issuer_id,
            self.invoice_number,
            self.issue_date.to_wire()
        )
    }
}
