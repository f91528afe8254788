//! # Error Types — Record Construction and Validation Failures
//!
//! All errors use `thiserror`. Validation errors carry the offending field
//! path so an operator can locate the bad input without reading a trace.

use thiserror::Error;

/// Failure while building or validating a fiscal record.
///
/// None of these are retriable: the same input produces the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A required source field is absent from the invoice snapshot.
    #[error("incomplete source data: {0}")]
    IncompleteSourceData(String),

    /// A cross-field rule of the record model does not hold.
    #[error("structural invariant violated: {0}")]
    StructuralInvariant(String),

    /// A field failed a format or range check.
    #[error("validation failed at {path}: {reason}")]
    Validation {
        /// Dotted path of the offending field.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// An identifier (tax id, invoice number, country code) is malformed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A monetary value or rate is not a two-decimal number.
    #[error("invalid amount {value:?}: {reason}")]
    InvalidAmount {
        /// The raw value as received.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A value is not a member of its code list.
    #[error("invalid {list} code: {value:?}")]
    InvalidCode {
        /// Name of the code list.
        list: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A date or timestamp could not be parsed or lacks an explicit offset.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl RecordError {
    /// Shorthand for a [`RecordError::Validation`] at `path`.
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; use a decimal string: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Canonicalization of the signed payload failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}
