//! # vf-record — Fiscal Record Model
//!
//! Turns invoice data into hashed, chain-positioned fiscal records.
//!
//! - [`snapshot`] maps a host invoice snapshot to a record body.
//! - [`builder`] assembles registration bodies and derives totals.
//! - [`corrective`] enforces field presence by invoice type.
//! - [`validation`] enforces line and total tolerances.
//! - [`hash`] renders the fingerprint payload.
//! - [`model`] holds the record types and the `Draft` → `Record` transition.
//!
//! Nothing in this crate performs I/O. Chain-head resolution and
//! persistence live in `vf-chain`.

pub mod builder;
pub mod corrective;
pub mod hash;
pub mod model;
pub mod snapshot;
pub mod validation;

#[cfg(test)]
mod testing;

pub use builder::RegistrationBuilder;
pub use hash::HashPayload;
pub use model::{
    BreakdownLine, Cancellation, ComputerSystem, CorrectedAmounts, Draft, PreviousRecord, Record,
    RecordBody, Registration, HASH_ALGORITHM_SHA256, ID_VERSION,
};
pub use snapshot::{
    BreakdownDefaults, CorrectedSource, HostInvoiceKind, InvoiceSnapshot, InvoiceStatus,
    SnapshotLine, ThirdParty,
};
