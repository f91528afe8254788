//! Errors raised by the artifact store.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reading or writing persisted artifacts.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("artifact store I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A protected copy already exists with different content.
    #[error("protected artifact {path} already exists with different content")]
    Conflict {
        /// Protected copy path.
        path: PathBuf,
    },

    /// The protected copy does not match its digest sidecar.
    #[error("integrity check failed for {path}: {reason}")]
    Integrity {
        /// Protected copy path.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// No protected copy exists to republish from.
    #[error("no protected artifact at {path}")]
    MissingSource {
        /// Expected protected copy path.
        path: PathBuf,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
