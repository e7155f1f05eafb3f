//! Shared error types for the analytics engine

use thiserror::Error;

/// Main error type for pmolens operations
#[derive(Debug, Error)]
pub enum Error {
    /// External project-data source errors (network failure, bad status,
    /// retries exhausted)
    #[error("Source error: {message}")]
    Source {
        message: String,
        status: Option<u16>,
        retryable: bool,
    },

    /// Request aborted by the caller-side signal
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Configuration / parameter-set errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cache operation errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Validation errors on normalized input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// Generic errors with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },

    /// Wrapped external errors
    #[error(transparent)]
    External(#[from] anyhow::Error),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a source error for a failed upstream request
    pub fn source_failure(
        message: impl Into<String>,
        status: Option<u16>,
        retryable: bool,
    ) -> Self {
        Self::Source {
            message: message.into(),
            status,
            retryable,
        }
    }

    /// Whether the error is worth retrying at the extractor boundary
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Source { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            message: self.to_string(),
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}
