//! # Code Lists — Regulated Wire Codes
//!
//! Every coded field of a record is a closed enum with a two-way mapping to
//! its wire code. Serde goes through the same mapping, so a JSON document
//! with an unknown code fails to load instead of producing a record the
//! authority will reject.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RecordError;

macro_rules! code_list {
    (
        $(#[$meta:meta])*
        pub enum $name:ident as $list:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every member, in wire-code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire code.
            pub fn code(&self) -> &'static str {
                match self {
                    $( Self::$variant => $code, )+
                }
            }

            /// Look up a member by wire code.
            ///
            /// # Errors
            ///
            /// Returns [`RecordError::InvalidCode`] for codes outside the list.
            pub fn from_code(code: &str) -> Result<Self, RecordError> {
                match code.trim() {
                    $( $code => Ok(Self::$variant), )+
                    other => Err(RecordError::InvalidCode {
                        list: $list,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }

        impl std::str::FromStr for $name {
            type Err = RecordError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_code(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::from_code(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

code_list! {
    /// Regulated invoice type (`TipoFactura`).
    pub enum InvoiceType as "invoice type" {
        /// Standard invoice.
        F1 => "F1",
        /// Simplified invoice (no identified recipient).
        F2 => "F2",
        /// Invoice issued in substitution of simplified invoices.
        F3 => "F3",
        /// Corrective, legal grounds art. 80.1, 80.2 and 80.6.
        R1 => "R1",
        /// Corrective, art. 80.3.
        R2 => "R2",
        /// Corrective, art. 80.4.
        R3 => "R3",
        /// Corrective, other grounds.
        R4 => "R4",
        /// Corrective of simplified invoices.
        R5 => "R5",
    }
}

impl InvoiceType {
    /// True for the correction family (R1..R5).
    pub fn is_corrective(&self) -> bool {
        matches!(self, Self::R1 | Self::R2 | Self::R3 | Self::R4 | Self::R5)
    }

    /// True for types that must not carry recipients.
    pub fn is_simplified(&self) -> bool {
        matches!(self, Self::F2 | Self::R5)
    }

    /// True only for the type that may list replaced simplified invoices.
    pub fn allows_replaced_invoices(&self) -> bool {
        matches!(self, Self::F3)
    }
}

code_list! {
    /// Correction mode (`TipoRectificativa`).
    pub enum CorrectiveType as "corrective type" {
        /// Substitution: the corrected amounts are restated in full.
        Substitution => "S",
        /// Differences: only the delta is declared.
        Differences => "I",
    }
}

code_list! {
    /// Tax being declared on a breakdown line (`Impuesto`).
    pub enum TaxType as "tax type" {
        /// Value added tax.
        Iva => "01",
        /// Ceuta and Melilla production, services and import tax.
        Ipsi => "02",
        /// Canary Islands general indirect tax.
        Igic => "03",
        /// Any other tax.
        Other => "05",
    }
}

code_list! {
    /// Operation qualification (`CalificacionOperacion` / `OperacionExenta`).
    pub enum OperationType as "operation type" {
        /// Subject and not exempt, no reverse charge.
        S1 => "S1",
        /// Subject and not exempt, reverse charge.
        S2 => "S2",
        /// Not subject, art. 7 and 14, others.
        N1 => "N1",
        /// Not subject by location rules.
        N2 => "N2",
        /// Exempt, art. 20.
        E1 => "E1",
        /// Exempt, art. 21.
        E2 => "E2",
        /// Exempt, art. 22.
        E3 => "E3",
        /// Exempt, art. 23 and 24.
        E4 => "E4",
        /// Exempt, art. 25.
        E5 => "E5",
        /// Exempt, other grounds.
        E6 => "E6",
    }
}

code_list! {
    /// Kind of foreign identification document (`IDType`).
    pub enum ForeignIdType as "foreign id type" {
        /// Intra-community VAT number.
        VatNumber => "02",
        /// Passport.
        Passport => "03",
        /// Official identity document of the country of residence.
        NationalId => "04",
        /// Residence certificate.
        ResidenceCertificate => "05",
        /// Other supporting document.
        Other => "06",
        /// Not registered.
        NotRegistered => "07",
    }
}

/// Tax regime key (`ClaveRegimen`), two digits in `01..=20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegimeCode(u8);

impl RegimeCode {
    /// General regime.
    pub const GENERAL: RegimeCode = RegimeCode(1);

    /// Parse a two-digit regime key.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidCode`] unless the value is two digits in `01..=20`.
    pub fn from_code(code: &str) -> Result<Self, RecordError> {
        let code = code.trim();
        let invalid = || RecordError::InvalidCode {
            list: "regime",
            value: code.to_string(),
        };
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let n: u8 = code.parse().map_err(|_| invalid())?;
        if !(1..=20).contains(&n) {
            return Err(invalid());
        }
        Ok(Self(n))
    }

    /// The wire code, zero-padded.
    pub fn code(&self) -> String {
        format!("{:02}", self.0)
    }
}

impl std::fmt::Display for RegimeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Serialize for RegimeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for RegimeCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_code(&raw).map_err(serde::de::Error::custom)
    }
}

/// The two record kinds a chain carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Invoice registration (`RegistroAlta`).
    Registration,
    /// Invoice cancellation (`RegistroAnulacion`).
    Cancellation,
}

impl RecordKind {
    /// Lowercase name, used in artifact file names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Cancellation => "cancellation",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(Self::Registration),
            "cancellation" => Ok(Self::Cancellation),
            other => Err(RecordError::InvalidCode {
                list: "record kind",
                value: other.to_string(),
            }),
        }
    }
}
