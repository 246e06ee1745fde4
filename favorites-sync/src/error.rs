//! Error types for the favorites sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Errors are `Clone` because a single failure is reported both to the
/// toggle's ticket and to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No active identity, or the gateway refused our credentials.
    #[error("not signed in")]
    Unauthorized,

    /// Network or transport failure.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    /// The gateway reported a failure.
    #[error("server error: {message}")]
    ServerError {
        status: Option<u16>,
        message: String,
    },

    /// The gateway rejected this specific mutation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// A response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Shorthand for a server error without an HTTP status.
    pub fn server(message: impl Into<String>) -> Self {
        SyncError::ServerError {
            status: None,
            message: message.into(),
        }
    }

    /// Returns true if repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Unreachable(_) | SyncError::Timeout => true,
            SyncError::ServerError { status, .. } => status.is_none_or(|s| s >= 500),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::InvalidResponse(e.to_string())
    }
}
