//! Error handling for the chat client.
//!
//! Two kinds of failure exist and are kept apart:
//!
//! - **Operation errors** ([`AdkError`]): a request could not be made or the
//!   backend rejected it. Returned through [`AdkResult`].
//! - **In-stream errors** ([`ErrorPayload`]): the backend reported a failure
//!   as an SSE event. These are normalized with [`normalize_error_payload`]
//!   and shown to the user as system messages.
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | RateLimit | HTTP 429 / quota exhausted | Yes |
//! | Auth | Credentials rejected | No |
//! | Server | Backend errors (5xx) | Yes |
//! | Network | Connection, timeout | Yes |
//! | Generic | Anything else | No |

mod adk_error;
mod category;
pub mod normalize;
mod result;

pub use adk_error::AdkError;
pub use category::ErrorCategory;
pub use normalize::{normalize_error_payload, ErrorPayload, NormalizedError};
pub use result::AdkResult;
