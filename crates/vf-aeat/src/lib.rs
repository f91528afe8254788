//! # vf-aeat — Authority Wire Layer
//!
//! Everything between a hashed [`vf_record::Record`] and the tax authority:
//!
//! - [`xml`] renders the record inside the SOAP envelope.
//! - [`response`] parses and classifies the authority's answer.
//! - [`client`] defines the [`Submitter`] seam, the mutual-TLS
//!   [`HttpSubmitter`], and the scripted [`MockSubmitter`].
//! - [`config`] selects the environment and the client certificate.
//!
//! ## Security Invariant
//!
//! Certificate passphrases never appear in `Debug` output or error messages.

pub mod client;
pub mod config;
pub mod error;
mod pem;
pub mod response;
pub mod xml;

pub use client::{HttpSubmitter, MockSubmitter, Submitter};
pub use config::{CertFormat, ClientConfig, ConfigError, Environment};
pub use error::SubmissionError;
pub use response::{SubmissionOutcome, SubmissionResponse};
pub use xml::Envelope;
