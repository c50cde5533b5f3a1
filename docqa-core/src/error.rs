//! Error taxonomy shared by every docqa crate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur anywhere in the docqa pipeline.
///
/// Every variant maps to an [`ErrorKind`], which is what callers branch on
/// and what the command line shows next to the message.
#[derive(Debug, Error)]
pub enum DocqaError {
    /// Bad parameters or missing credentials. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A network blip or timeout. Retried with backoff, then surfaced.
    #[error("Transient error ({provider}): {message}")]
    Transient {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider rejected the credentials. Never retried.
    #[error("Authentication error ({provider}): {message}")]
    Authentication {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider is rate limiting us.
    #[error("Quota exceeded ({provider}): {message}")]
    QuotaExceeded {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Wait hint reported by the provider, if any.
        retry_after: Option<Duration>,
    },

    /// A required artifact (usually the persisted index) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embeddings from different models or dimensionalities were mixed.
    #[error("Model mismatch: expected {expected}, got {actual}")]
    ModelMismatch {
        /// What the index was built with.
        expected: String,
        /// What the caller supplied.
        actual: String,
    },

    /// Reading or writing durable state failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Text could not be extracted from a document.
    #[error("Extraction error ({source_id}): {message}")]
    Extraction {
        /// The document the error relates to.
        source_id: String,
        /// A description of the failure.
        message: String,
    },

    /// The provider returned a response we cannot use. Never retried.
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

/// The category of a [`DocqaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Transient,
    Authentication,
    QuotaExceeded,
    NotFound,
    ModelMismatch,
    Storage,
    Extraction,
    Provider,
}

impl ErrorKind {
    /// Stable snake_case name, used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transient => "transient",
            ErrorKind::Authentication => "authentication",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ModelMismatch => "model_mismatch",
            ErrorKind::Storage => "storage",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Provider => "provider",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DocqaError {
    /// Return the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocqaError::Configuration(_) => ErrorKind::Configuration,
            DocqaError::Transient { .. } => ErrorKind::Transient,
            DocqaError::Authentication { .. } => ErrorKind::Authentication,
            DocqaError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            DocqaError::NotFound(_) => ErrorKind::NotFound,
            DocqaError::ModelMismatch { .. } => ErrorKind::ModelMismatch,
            DocqaError::Storage(_) => ErrorKind::Storage,
            DocqaError::Extraction { .. } => ErrorKind::Extraction,
            DocqaError::Provider { .. } => ErrorKind::Provider,
        }
    }

    /// Whether the retry policy should attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::QuotaExceeded)
    }

    /// The provider's wait hint, for [`DocqaError::QuotaExceeded`] only.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DocqaError::QuotaExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        DocqaError::Transient { provider: provider.into(), message: message.into() }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        DocqaError::Provider { provider: provider.into(), message: message.into() }
    }
}

/// A convenience result type for docqa operations.
pub type Result<T> = std::result::Result<T, DocqaError>;
