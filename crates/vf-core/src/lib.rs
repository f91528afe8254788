//! # vf-core — Foundational Types for the Fiscal Record Chain
//!
//! Every other crate in the workspace depends on `vf-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for fiscal primitives.** `TaxId`, `InvoiceNumber`,
//!    `CountryCode`, `Amount`, `TaxRate`, `RecordHash` all validate at
//!    construction and at deserialization. No bare strings cross a crate
//!    boundary once an identifier has been accepted.
//!
//! 2. **Closed code lists.** Invoice types, corrective types, tax types,
//!    operation qualifications and foreign id types are enums with an
//!    exhaustive wire-code mapping. Unknown codes never reach a record.
//!
//! 3. **Exact money.** `Amount` is a decimal fixed at two places. Floats
//!    never appear on a hash or signature path.
//!
//! 4. **`CanonicalBytes` newtype.** Audit-log signatures are computed over
//!    `CanonicalBytes` only, which rejects floats and sorts keys (RFC 8785).
//!
//! ## Crate Policy
//!
//! - No dependencies on other `vf-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod canonical;
pub mod codes;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use amount::{Amount, TaxRate, TOLERANCE_STEPS_CENTS};
pub use canonical::CanonicalBytes;
pub use codes::{
    CorrectiveType, ForeignIdType, InvoiceType, OperationType, RecordKind, RegimeCode, TaxType,
};
pub use digest::{RecordHash, CHAIN_REFERENCE_LEN};
pub use error::{CanonicalizationError, CryptoError, RecordError};
pub use identity::{
    CountryCode, FiscalIdentifier, ForeignFiscalIdentifier, InvoiceIdentifier, InvoiceNumber,
    Recipient, TaxId,
};
pub use temporal::{HashedAt, IssueDate};
