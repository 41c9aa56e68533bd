//! Result type alias for client operations.

use super::adk_error::AdkError;

/// Type alias for Results using AdkError.
pub type AdkResult<T> = Result<T, AdkError>;
