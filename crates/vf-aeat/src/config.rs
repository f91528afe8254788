//! Submission client configuration.
//!
//! Selects the authority environment and the client certificate used for
//! mutual TLS. Defaults point to the test environment. Override via
//! environment variables or explicit construction.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Path of the continuous-submission SOAP service on both environments.
pub const SUBMISSION_PATH: &str = "/wlpl/TIKE-CONT/ws/SistemaFacturacion/VerifactuSOAP";

/// Base URL of the production environment.
pub const PRODUCTION_BASE_URL: &str = "https://www1.agenciatributaria.gob.es";

/// Base URL of the test environment.
pub const TEST_BASE_URL: &str = "https://prewww1.aeat.es";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("vf-aeat/", env!("CARGO_PKG_VERSION"));

/// Authority environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Pre-production environment.
    #[default]
    Test,
    /// Production environment. Records sent here are legally binding.
    Production,
}

impl Environment {
    /// Base URL of the environment, without path.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Test => TEST_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::InvalidValue {
                field: "environment".into(),
                value: other.into(),
            }),
        }
    }
}

/// Encoding of the client certificate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertFormat {
    /// PEM file holding the certificate chain and an unencrypted key.
    Pem,
    /// PKCS#12 bundle, optionally passphrase-protected.
    Pkcs12,
}

impl CertFormat {
    /// Infer the format from the file extension: `.p12`/`.pfx` are PKCS#12,
    /// everything else is PEM.
    pub fn infer(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("p12") | Some("pfx") => Self::Pkcs12,
            _ => Self::Pem,
        }
    }
}

impl FromStr for CertFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pem" => Ok(Self::Pem),
            "pkcs12" | "p12" | "pfx" => Ok(Self::Pkcs12),
            other => Err(ConfigError::InvalidValue {
                field: "cert_format".into(),
                value: other.into(),
            }),
        }
    }
}

/// Configuration for the submission client.
///
/// Custom `Debug` implementation redacts `cert_password` to prevent
/// credential leakage in log output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Target environment.
    #[serde(default)]
    pub environment: Environment,
    /// Client certificate file.
    pub cert_path: PathBuf,
    /// Certificate encoding; inferred from the extension when absent.
    #[serde(default)]
    pub cert_format: Option<CertFormat>,
    /// Passphrase of a PKCS#12 bundle.
    #[serde(default)]
    pub cert_password: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Full endpoint URL overriding the environment's, for test doubles.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("environment", &self.environment)
            .field("cert_path", &self.cert_path)
            .field("cert_format", &self.cert_format)
            .field(
                "cert_password",
                &self.cert_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the certificate.
    pub fn new(environment: Environment, cert_path: impl Into<PathBuf>) -> Self {
        Self {
            environment,
            cert_path: cert_path.into(),
            cert_format: None,
            cert_password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
            endpoint: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `VERIFACTU_CERT` (required)
    /// - `VERIFACTU_ENVIRONMENT` (`test` | `production`, default: `test`)
    /// - `VERIFACTU_CERT_FORMAT` (`pem` | `pkcs12`, default: by extension)
    /// - `VERIFACTU_CERT_PASSWORD` (optional)
    /// - `VERIFACTU_TIMEOUT_SECS` (positive integer, default: 30)
    /// - `VERIFACTU_ENDPOINT` (optional full URL override)
    pub fn from_env() -> Result<Self, ConfigError> {
        let cert_path = std::env::var("VERIFACTU_CERT").map_err(|_| ConfigError::MissingCertificate)?;
        let environment = match std::env::var("VERIFACTU_ENVIRONMENT") {
            Ok(v) => v.parse()?,
            Err(_) => Environment::default(),
        };
        let cert_format = match std::env::var("VERIFACTU_CERT_FORMAT") {
            Ok(v) => Some(v.parse()?),
            Err(_) => None,
        };
        let endpoint = env_url("VERIFACTU_ENDPOINT")?.map(|u| u.to_string());

        Ok(Self {
            environment,
            cert_path: PathBuf::from(cert_path),
            cert_format,
            cert_password: std::env::var("VERIFACTU_CERT_PASSWORD").ok(),
            timeout_secs: parse_timeout(std::env::var("VERIFACTU_TIMEOUT_SECS").ok())?,
            user_agent: default_user_agent(),
            endpoint,
        })
    }

    /// Certificate encoding, explicit or inferred.
    pub fn effective_cert_format(&self) -> CertFormat {
        self.cert_format
            .unwrap_or_else(|| CertFormat::infer(&self.cert_path))
    }

    /// The URL records are posted to.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the override does not parse.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let raw = match &self.endpoint {
            Some(e) => e.clone(),
            None => format!("{}{}", self.environment.base_url(), SUBMISSION_PATH),
        };
        Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl("endpoint".to_string(), e.to_string()))
    }
}

fn env_url(var: &str) -> Result<Option<Url>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => Url::parse(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("VERIFACTU_CERT environment variable is required")]
    MissingCertificate,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: String, value: String },
    #[error("cannot load client certificate {path}: {reason}")]
    Certificate { path: String, reason: String },
}

/// Request timeout from its variable's raw value; unset means the default.
fn parse_timeout(raw: Option<String>) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TIMEOUT_SECS);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue {
            field: "timeout_secs".into(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_must_be_a_positive_integer() {
        assert_eq!(parse_timeout(None).unwrap(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(parse_timeout(Some(" 45 ".into())).unwrap(), 45);
        for bad in ["thirty", "0", "-5", "1.5", ""] {
            match parse_timeout(Some(bad.into())) {
                Err(ConfigError::InvalidValue { field, value }) => {
                    assert_eq!(field, "timeout_secs");
                    assert_eq!(value, bad);
                }
                other => panic!("{bad:?} gave {other:?}"),
            }
        }
    }

    #[test]
    fn endpoint_follows_environment() {
        let cfg = ClientConfig::new(Environment::Production, "cert.pem");
        assert_eq!(
            cfg.endpoint_url().unwrap().as_str(),
            "https://www1.agenciatributaria.gob.es/wlpl/TIKE-CONT/ws/SistemaFacturacion/VerifactuSOAP"
        );
        let cfg = ClientConfig::new(Environment::Test, "cert.pem");
        assert!(cfg
            .endpoint_url()
            .unwrap()
            .as_str()
            .starts_with("https://prewww1.aeat.es/wlpl/"));
    }

    #[test]
    fn endpoint_override_wins() {
        let mut cfg = ClientConfig::new(Environment::Production, "cert.pem");
        cfg.endpoint = Some("http://127.0.0.1:9000/soap".into());
        assert_eq!(cfg.endpoint_url().unwrap().as_str(), "http://127.0.0.1:9000/soap");
        cfg.endpoint = Some("not a url".into());
        assert!(matches!(cfg.endpoint_url(), Err(ConfigError::InvalidUrl(..))));
    }

    #[test]
    fn cert_format_inferred_from_extension() {
        assert_eq!(CertFormat::infer(Path::new("a/b/client.P12")), CertFormat::Pkcs12);
        assert_eq!(CertFormat::infer(Path::new("client.pfx")), CertFormat::Pkcs12);
        assert_eq!(CertFormat::infer(Path::new("client.pem")), CertFormat::Pem);
        assert_eq!(CertFormat::infer(Path::new("client")), CertFormat::Pem);

        let mut cfg = ClientConfig::new(Environment::Test, "client.p12");
        assert_eq!(cfg.effective_cert_format(), CertFormat::Pkcs12);
        cfg.cert_format = Some(CertFormat::Pem);
        assert_eq!(cfg.effective_cert_format(), CertFormat::Pem);
    }

    #[test]
    fn debug_redacts_password() {
        let mut cfg = ClientConfig::new(Environment::Test, "client.p12");
        cfg.cert_password = Some("hunter2".into());
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn environment_parses() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn yaml_defaults_apply() {
        let cfg: ClientConfig = serde_json::from_str(r#"{"cert_path":"c.pem"}"#).unwrap();
        assert_eq!(cfg.environment, Environment::Test);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(cfg.cert_password.is_none());
    }
}
