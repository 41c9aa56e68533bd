//! Unified error type for the chat client and proxy.

use thiserror::Error;

use super::category::ErrorCategory;
use super::normalize::{ErrorPayload, NormalizedError};
use crate::traits::HttpError;

/// Errors surfaced by client operations.
///
/// Errors that occur *inside* an SSE stream are not represented here; those
/// become [`crate::sse::StreamEvent::Error`] events and end up as system
/// messages in the conversation.
#[derive(Debug, Error)]
pub enum AdkError {
    /// The transport failed or the backend answered with an error status.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A response body could not be decoded.
    #[error("invalid response from agent server: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading or writing local files failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// No session has been created yet.
    #[error("not connected: no active session")]
    NotConnected,

    /// No agent app is selected.
    #[error("no agent app selected")]
    NoAppSelected,
}

impl AdkError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AdkError::Http(HttpError::ServerError { status, .. }) => {
                ErrorCategory::from_status(*status).unwrap_or(ErrorCategory::Generic)
            }
            AdkError::Http(HttpError::ConnectionFailed(_))
            | AdkError::Http(HttpError::Timeout(_))
            | AdkError::Http(HttpError::Io(_)) => ErrorCategory::Network,
            _ => ErrorCategory::Generic,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Normalized form suitable for a system message.
    pub fn normalized(&self) -> NormalizedError {
        match self {
            AdkError::Http(HttpError::ServerError { status, message }) => {
                super::normalize_error_payload(&ErrorPayload::from_status(*status, message))
            }
            AdkError::Http(err) if self.category() == ErrorCategory::Network => {
                NormalizedError::connection(err.to_string())
            }
            other => NormalizedError::new(other.category(), format!("Error: {}", other)),
        }
    }
}
