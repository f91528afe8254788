//! Submission error types.

/// Errors from rendering or submitting a record.
///
/// `AcceptedWithWarnings` is not here: an accepted record with an anomaly
/// code is a successful [`crate::SubmissionOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// Connection, TLS or timeout failure, or a 5xx without a fault body.
    /// Nothing reached the authority's ledger, or it cannot be told.
    #[error("transport failure calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The response carried a SOAP fault or was not understood.
    #[error("protocol fault{}: {message}", suffix(.code, " "))]
    ProtocolFault {
        code: Option<String>,
        message: String,
    },

    /// The authority explicitly rejected the record.
    #[error("record rejected{}: {message}", suffix(.code, " with code "))]
    Rejected {
        code: Option<String>,
        message: String,
    },

    /// The record could not be rendered to XML.
    #[error("XML serialization failed: {0}")]
    Serialization(String),

    /// Configuration or certificate error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

fn suffix(code: &Option<String>, lead: &str) -> String {
    code.as_deref()
        .map(|c| format!("{lead}{c}"))
        .unwrap_or_default()
}

impl SubmissionError {
    /// True only for transport failures. Every other error needs operator
    /// attention before the same record may be sent again.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
