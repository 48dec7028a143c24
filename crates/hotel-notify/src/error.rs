//! Notification subsystem error types.

use std::time::Duration;

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur while delivering notifications.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Push channel errors (open failure, abrupt close)
    #[error("Connection error: {0}")]
    Connection(String),

    /// An operation did not complete in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP transport errors from the REST collaborator
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status returned by the REST collaborator
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required input (token, base URL) has not been supplied yet
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),
}

impl NotifyError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
