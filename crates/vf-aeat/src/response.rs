//! # Response Classification
//!
//! Parses the authority's SOAP response and folds it, together with the
//! HTTP status, into either a [`SubmissionResponse`] or a
//! [`SubmissionError`].
//!
//! | Condition                                   | Result                  |
//! |---------------------------------------------|-------------------------|
//! | `Fault` element present                     | `ProtocolFault`         |
//! | HTTP 5xx, no fault                          | `Transport` (retriable) |
//! | other non-2xx, no fault                     | `ProtocolFault`         |
//! | `EstadoRegistro` = `Correcto`               | `Accepted`              |
//! | `EstadoRegistro` = `AceptadoConErrores`     | `AcceptedWithWarnings`  |
//! | `EstadoRegistro` = `Incorrecto`             | `Rejected`              |
//!
//! When the per-record state is missing the submission state decides, and a
//! body carrying neither is a protocol fault.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::SubmissionError;

/// Longest body excerpt quoted in an error message.
const EXCERPT_LEN: usize = 512;

/// State of the whole submission (`EstadoEnvio`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    Correct,
    PartiallyCorrect,
    Incorrect,
}

impl SubmissionState {
    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "Correcto" => Some(Self::Correct),
            "ParcialmenteCorrecto" => Some(Self::PartiallyCorrect),
            "Incorrecto" => Some(Self::Incorrect),
            _ => None,
        }
    }
}

/// State of the single record (`EstadoRegistro`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Correct,
    AcceptedWithErrors,
    Incorrect,
}

impl RecordState {
    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "Correcto" => Some(Self::Correct),
            "AceptadoConErrores" => Some(Self::AcceptedWithErrors),
            "Incorrecto" => Some(Self::Incorrect),
            _ => None,
        }
    }
}

/// How the authority took an accepted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Accepted without remarks.
    Accepted,
    /// Accepted, with an anomaly that must be kept next to the hash.
    AcceptedWithWarnings { code: String, message: String },
}

impl SubmissionOutcome {
    /// True for [`SubmissionOutcome::AcceptedWithWarnings`].
    pub fn has_warnings(&self) -> bool {
        matches!(self, Self::AcceptedWithWarnings { .. })
    }
}

/// A successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    /// Acceptance classification.
    pub outcome: SubmissionOutcome,
    /// Secure verification code assigned by the authority, if any.
    pub csv: Option<String>,
    /// Raw response body.
    pub raw: String,
}

/// Fields extracted from a response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub submission_state: Option<SubmissionState>,
    pub record_state: Option<RecordState>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub csv: Option<String>,
    pub fault: Option<Fault>,
}

/// A SOAP fault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fault {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Extract the known fields from a SOAP body, ignoring namespaces.
///
/// # Errors
///
/// Returns [`SubmissionError::ProtocolFault`] if the body is not well-formed XML.
pub fn parse(body: &str) -> Result<ParsedResponse, SubmissionError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut parsed = ParsedResponse::default();
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if current == "Fault" {
                    parsed.fault.get_or_insert_with(Fault::default);
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Fault" {
                    parsed.fault.get_or_insert_with(Fault::default);
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(malformed)?.trim().to_string();
                if text.is_empty() {
                    continue;
                }
                match current.as_str() {
                    "EstadoEnvio" => parsed.submission_state = SubmissionState::from_wire(&text),
                    "EstadoRegistro" => parsed.record_state = RecordState::from_wire(&text),
                    "CodigoErrorRegistro" => parsed.error_code = Some(text),
                    "DescripcionErrorRegistro" => parsed.error_message = Some(text),
                    "CSV" => parsed.csv = Some(text),
                    "faultcode" => {
                        parsed.fault.get_or_insert_with(Fault::default).code = Some(text)
                    }
                    "faultstring" => {
                        parsed.fault.get_or_insert_with(Fault::default).message = Some(text)
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current.clear(),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(e)),
        }
    }
    Ok(parsed)
}

/// Classify an HTTP response from `endpoint`.
pub fn classify(
    endpoint: &str,
    status: u16,
    body: String,
) -> Result<SubmissionResponse, SubmissionError> {
    let parsed = match parse(&body) {
        Ok(p) => p,
        Err(_) if status >= 500 => {
            return Err(SubmissionError::Transport {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {status}: {}", excerpt(&body)),
            })
        }
        Err(e) => return Err(e),
    };

    if let Some(fault) = parsed.fault {
        return Err(SubmissionError::ProtocolFault {
            code: fault.code,
            message: fault
                .message
                .unwrap_or_else(|| format!("HTTP {status} with an empty fault")),
        });
    }
    if status >= 500 {
        return Err(SubmissionError::Transport {
            endpoint: endpoint.to_string(),
            message: format!("HTTP {status}: {}", excerpt(&body)),
        });
    }
    if !(200..300).contains(&status) {
        return Err(SubmissionError::ProtocolFault {
            code: Some(status.to_string()),
            message: excerpt(&body),
        });
    }

    let accepted = |outcome: SubmissionOutcome| -> Result<SubmissionResponse, SubmissionError> {
        Ok(SubmissionResponse {
            outcome,
            csv: parsed.csv.clone(),
            raw: body.clone(),
        })
    };
    let rejected = || -> Result<SubmissionResponse, SubmissionError> {
        Err(SubmissionError::Rejected {
            code: parsed.error_code.clone(),
            message: parsed
                .error_message
                .clone()
                .unwrap_or_else(|| "rejected without description".to_string()),
        })
    };

    match (parsed.record_state, parsed.submission_state) {
        (Some(RecordState::Correct), _) => accepted(SubmissionOutcome::Accepted),
        (Some(RecordState::AcceptedWithErrors), _) => {
            accepted(SubmissionOutcome::AcceptedWithWarnings {
                code: parsed.error_code.clone().unwrap_or_default(),
                message: parsed.error_message.clone().unwrap_or_default(),
            })
        }
        (Some(RecordState::Incorrect), _) => rejected(),
        (None, Some(SubmissionState::Correct)) => accepted(SubmissionOutcome::Accepted),
        (None, Some(SubmissionState::Incorrect)) => rejected(),
        (None, _) => Err(SubmissionError::ProtocolFault {
            code: None,
            message: "response carries no record state".to_string(),
        }),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(EXCERPT_LEN) {
        Some((i, _)) => format!("{}...", &trimmed[..i]),
        None => trimmed.to_string(),
    }
}

fn malformed<E: std::fmt::Display>(e: E) -> SubmissionError {
    SubmissionError::ProtocolFault {
        code: None,
        message: format!("malformed response: {e}"),
    }
}
