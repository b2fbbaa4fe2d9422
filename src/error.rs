use std::result;

use thiserror::Error;

use crate::models::Provider;

/// Error types for publication tracker operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Empty or malformed search input, raised before any network call
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// XML parsing failed
    #[error("XML parsing failed: {0}")]
    XmlError(String),

    /// Provider answered with a non-success status
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Provider throttling could not be honoured
    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Requested record is unknown to the provider
    #[error("{provider} record not found: {provider_id}")]
    NotFound {
        provider: Provider,
        provider_id: String,
    },
}

pub type Result<T> = result::Result<T, TrackerError>;

impl TrackerError {
    /// Whether this error came from talking to a provider (transport,
    /// status or payload decoding).
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            TrackerError::RequestError(_)
                | TrackerError::JsonError(_)
                | TrackerError::XmlError(_)
                | TrackerError::ApiError { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TrackerError::Cancelled)
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::StorageError(err.to_string())
    }
}

impl From<quick_xml::Error> for TrackerError {
    fn from(err: quick_xml::Error) -> Self {
        TrackerError::XmlError(err.to_string())
    }
}
