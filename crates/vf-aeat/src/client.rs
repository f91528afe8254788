//! Submission transport.
//!
//! [`Submitter`] is the seam between the lifecycle engine and the network.
//! [`HttpSubmitter`] posts the rendered envelope over mutual TLS;
//! [`MockSubmitter`] replays a script and records what it was sent.
//!
//! Neither implementation retries. A transport failure is returned to the
//! caller, which decides whether to try again against the same chain head.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use url::Url;

use crate::config::{CertFormat, ClientConfig, ConfigError};
use crate::error::SubmissionError;
use crate::pem;
use crate::response::{classify, SubmissionOutcome, SubmissionResponse};

/// Sends one rendered envelope and classifies the answer.
///
/// Implementations must be `Send + Sync` so one instance can serve every
/// issuer's lifecycle events from any thread.
pub trait Submitter: Send + Sync {
    /// Post `envelope` and classify the response.
    fn submit(&self, envelope: &str) -> Result<SubmissionResponse, SubmissionError>;

    /// Human-readable implementation name, for logs.
    fn submitter_name(&self) -> &str;
}

impl<S: Submitter + ?Sized> Submitter for std::sync::Arc<S> {
    fn submit(&self, envelope: &str) -> Result<SubmissionResponse, SubmissionError> {
        (**self).submit(envelope)
    }

    fn submitter_name(&self) -> &str {
        (**self).submitter_name()
    }
}

/// Blocking HTTPS client authenticated with a client certificate.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    client: Client,
    endpoint: Url,
}

impl HttpSubmitter {
    /// Build a client from `config`, loading the certificate from disk.
    ///
    /// PEM files go through rustls; an encrypted PKCS#8 key in them is
    /// decrypted with the configured passphrase first. PKCS#12 bundles go
    /// through the platform TLS stack and may carry a passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Config`] if the endpoint, certificate or
    /// TLS setup is invalid.
    pub fn new(config: &ClientConfig) -> Result<Self, SubmissionError> {
        let endpoint = config.endpoint_url()?;
        let path = config.cert_path.display().to_string();
        let cert_error = |reason: String| ConfigError::Certificate {
            path: path.clone(),
            reason,
        };

        let bytes = std::fs::read(&config.cert_path).map_err(|e| cert_error(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );

        let builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers);

        let builder = match config.effective_cert_format() {
            CertFormat::Pem => {
                let pem = pem::decrypt_identity(&bytes, config.cert_password.as_deref())
                    .map_err(cert_error)?;
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|e| cert_error(e.to_string()))?;
                builder.use_rustls_tls().identity(identity)
            }
            CertFormat::Pkcs12 => {
                let password = config.cert_password.as_deref().unwrap_or("");
                let identity = reqwest::Identity::from_pkcs12_der(&bytes, password)
                    .map_err(|e| cert_error(e.to_string()))?;
                builder.use_native_tls().identity(identity)
            }
        };

        let client = builder
            .build()
            .map_err(|e| cert_error(format!("TLS client setup failed: {e}")))?;

        tracing::info!(
            endpoint = %endpoint,
            environment = ?config.environment,
            "submission client ready"
        );
        Ok(Self { client, endpoint })
    }

    /// The URL envelopes are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Submitter for HttpSubmitter {
    fn submit(&self, envelope: &str) -> Result<SubmissionResponse, SubmissionError> {
        let endpoint = self.endpoint.as_str();
        let transport = |e: reqwest::Error| {
            let message = if e.is_timeout() {
                format!("request timed out: {e}")
            } else {
                e.to_string()
            };
            SubmissionError::Transport {
                endpoint: endpoint.to_string(),
                message,
            }
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .body(envelope.to_string())
            .send()
            .map_err(transport)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(transport)?;

        tracing::debug!(endpoint, status, bytes = body.len(), "authority responded");
        classify(endpoint, status, body)
    }

    fn submitter_name(&self) -> &str {
        "HttpSubmitter"
    }
}

/// Scripted submitter for tests and dry runs.
///
/// Each call pops the next scripted result; an empty script accepts. Every
/// envelope received is kept for inspection.
#[derive(Debug, Default)]
pub struct MockSubmitter {
    script: Mutex<VecDeque<Result<SubmissionResponse, SubmissionError>>>,
    sent: Mutex<Vec<String>>,
}

impl MockSubmitter {
    /// A submitter that accepts everything.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Queue the result of the next call.
    pub fn push(&self, result: Result<SubmissionResponse, SubmissionError>) {
        self.script.lock().push_back(result);
    }

    /// Queue an acceptance with warnings.
    pub fn push_warning(&self, code: &str, message: &str) {
        self.push(Ok(SubmissionResponse {
            outcome: SubmissionOutcome::AcceptedWithWarnings {
                code: code.to_string(),
                message: message.to_string(),
            },
            csv: None,
            raw: String::new(),
        }));
    }

    /// Queue a transport failure.
    pub fn push_transport_failure(&self, message: &str) {
        self.push(Err(SubmissionError::Transport {
            endpoint: "mock".to_string(),
            message: message.to_string(),
        }));
    }

    /// Envelopes received so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl Submitter for MockSubmitter {
    fn submit(&self, envelope: &str) -> Result<SubmissionResponse, SubmissionError> {
        self.sent.lock().push(envelope.to_string());
        match self.script.lock().pop_front() {
            Some(result) => result,
            None => Ok(SubmissionResponse {
                outcome: SubmissionOutcome::Accepted,
                csv: Some(format!("MOCK-{:08}", self.sent.lock().len())),
                raw: String::new(),
            }),
        }
    }

    fn submitter_name(&self) -> &str {
        "MockSubmitter"
    }
}
