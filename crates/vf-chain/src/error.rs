//! Chain engine error types.
//!
//! [`ChainError`] is the surface every lifecycle operation reports through.
//! Construction and validation errors come in as [`RecordError`]; submission
//! errors are split by retriability; anything that goes wrong after the
//! authority accepted a record is a [`ChainError::Persistence`].

use thiserror::Error;
use vf_aeat::SubmissionError;
use vf_core::{RecordError, RecordKind};
use vf_crypto::StoreError;

use crate::audit::AuditError;
use crate::ledger::LedgerError;

/// Errors from the record chain engine.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The record could not be built or failed validation. Nothing was sent.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The predecessor could not be determined safely. Nothing was sent.
    #[error("cannot resolve chain predecessor for {issuer}: {reason}")]
    ChainLookup { issuer: String, reason: String },

    /// A record of this kind already exists for the invoice.
    #[error("{kind} record already persisted for invoice {invoice}")]
    Duplicate { invoice: String, kind: RecordKind },

    /// Connection, TLS or timeout failure. Safe to retry: the chain head
    /// did not move.
    #[error("transport failure calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The authority answered with a fault. Needs operator attention.
    #[error("protocol fault{}: {message}", code_suffix(.code))]
    ProtocolFault {
        code: Option<String>,
        message: String,
    },

    /// The authority rejected the record.
    #[error("record rejected{}: {message}", code_suffix(.code))]
    Rejected {
        code: Option<String>,
        message: String,
    },

    /// The envelope could not be rendered or the client is misconfigured.
    #[error("submission setup failed: {0}")]
    Submission(String),

    /// The lifecycle guard refused the host action.
    #[error("action denied: {0}")]
    Denied(String),

    /// A pre-submission hook aborted the attempt.
    #[error("submission vetoed by {hook}: {reason}")]
    Vetoed { hook: String, reason: String },

    /// The authority accepted the record but it could not be persisted.
    /// Retrying would submit it twice.
    #[error("accepted record {hash} for invoice {invoice} could not be persisted: {reason}")]
    Persistence {
        invoice: String,
        hash: String,
        reason: String,
    },

    /// Ledger read failure outside the chain-lookup path.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Artifact store failure outside the persist path.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Audit log storage or signing failure.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" [{c}]"))
        .unwrap_or_default()
}

impl ChainError {
    /// True only for transport failures.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// True for the failure that must raise an operational alert.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

impl From<SubmissionError> for ChainError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Transport { endpoint, message } => Self::Transport { endpoint, message },
            SubmissionError::ProtocolFault { code, message } => Self::ProtocolFault { code, message },
            SubmissionError::Rejected { code, message } => Self::Rejected { code, message },
            other @ (SubmissionError::Serialization(_) | SubmissionError::Config(_)) => {
                Self::Submission(other.to_string())
            }
        }
    }
}
