//! Normalization of backend error payloads.
//!
//! The agent server and the proxy report failures in several irregular
//! shapes:
//!
//! - `{"error": true, "status": 429, "message": "...", "details": "..."}`
//!   (synthesized by the proxy)
//! - `{"error": {"code": 401, "message": "..."}}`
//! - `{"error": "500 INTERNAL. {\"error\": {\"message\": \"...\"}}"}`, a
//!   string with a JSON blob embedded in it
//! - `{"errorCode": "...", "errorMessage": "..."}` on ADK events
//!
//! [`normalize_error_payload`] reduces all of them to a [`NormalizedError`]
//! with a category and a canonical, human-readable message.

use std::fmt;

use serde_json::Value;

use super::category::ErrorCategory;

/// Canonical text shown for rate-limited requests.
pub const RATE_LIMIT_MESSAGE: &str =
    "Rate limit exceeded: the model is receiving too many requests. Please wait a moment and try again.";

/// Canonical text shown when the backend rejects its credentials.
pub const AUTH_ERROR_MESSAGE: &str =
    "Authentication error: the agent server could not authenticate with the model provider.";

/// Canonical text shown for backend 5xx failures.
pub const SERVER_ERROR_MESSAGE: &str =
    "The agent server encountered an internal error. Please try again.";

/// Canonical text shown when the request never reached the backend.
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Connection error: unable to reach the agent server.";

/// Upper bound on the raw dump included in generic error messages.
const MAX_DUMP_CHARS: usize = 500;

/// The fields of an error event that matter for normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorPayload {
    /// HTTP-like status code, if the payload carries one
    pub status: Option<u16>,
    /// Primary message, possibly containing an embedded JSON blob
    pub message: Option<String>,
    /// Secondary details
    pub details: Option<String>,
    /// The untouched payload, used for signature matching and fallback dumps
    pub raw: Value,
}

impl ErrorPayload {
    /// Extract an error payload from a decoded SSE event or response body.
    pub fn from_value(value: &Value) -> Self {
        let error_field = value.get("error");

        let status = value
            .get("status")
            .and_then(status_from_value)
            .or_else(|| error_field.and_then(|e| e.get("code")).and_then(status_from_value))
            .or_else(|| error_field.and_then(|e| e.get("status")).and_then(status_from_value));

        let message = non_empty_str(value.get("message"))
            .or_else(|| error_field.and_then(|e| non_empty_str(e.get("message"))))
            .or_else(|| non_empty_str(error_field))
            .or_else(|| non_empty_str(value.get("errorMessage")));

        let details = match value.get("details") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Null) | Some(Value::String(_)) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Self {
            status,
            message,
            details,
            raw: value.clone(),
        }
    }

    /// Create a payload from a bare HTTP status and response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) if value.is_object() => {
                let mut payload = Self::from_value(&value);
                payload.status = payload.status.or(Some(status));
                payload
            }
            _ => Self {
                status: Some(status),
                message: Some(body.trim().to_string()).filter(|s| !s.is_empty()),
                details: None,
                raw: Value::String(body.to_string()),
            },
        }
    }

    /// Everything that signature matching should look at.
    fn haystack(&self) -> String {
        let mut text = match &self.raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        for part in [&self.message, &self.details].into_iter().flatten() {
            text.push('\n');
            text.push_str(part);
        }
        text
    }
}

/// A backend error reduced to a category and display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    pub category: ErrorCategory,
    /// Canonical or extracted message
    pub message: String,
    /// Extra information shown below the message, if any
    pub detail: Option<String>,
}

impl NormalizedError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail.filter(|d| !d.trim().is_empty() && *d != self.message);
        self
    }

    /// Error for a request that failed at the transport level.
    pub fn connection(cause: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, CONNECTION_ERROR_MESSAGE).with_detail(Some(cause.into()))
    }

    /// Text for the `system` bubble.
    pub fn display_text(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}\n{}", self.message, detail),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_text())
    }
}

/// Map an irregular error payload to a category and canonical message.
///
/// Signature order: rate limit (anywhere in the payload's text), then status
/// code (top-level or embedded), then an extracted message, then a dump of
/// the raw payload.
pub fn normalize_error_payload(payload: &ErrorPayload) -> NormalizedError {
    if is_rate_limited(&payload.haystack()) {
        return NormalizedError::new(ErrorCategory::RateLimit, RATE_LIMIT_MESSAGE);
    }

    let embedded = payload.message.as_deref().and_then(extract_embedded_error);
    let message = embedded
        .as_ref()
        .and_then(|e| e.message.clone())
        .or_else(|| payload.message.clone());
    let status = payload
        .status
        .or_else(|| embedded.as_ref().and_then(|e| e.status));

    match status.and_then(ErrorCategory::from_status) {
        Some(ErrorCategory::RateLimit) => {
            return NormalizedError::new(ErrorCategory::RateLimit, RATE_LIMIT_MESSAGE);
        }
        Some(ErrorCategory::Auth) => {
            return NormalizedError::new(ErrorCategory::Auth, AUTH_ERROR_MESSAGE)
                .with_detail(message);
        }
        Some(ErrorCategory::Server) => {
            return NormalizedError::new(ErrorCategory::Server, SERVER_ERROR_MESSAGE)
                .with_detail(message.or_else(|| payload.details.clone()));
        }
        _ => {}
    }

    match message {
        Some(msg) => NormalizedError::new(ErrorCategory::Generic, format!("Error: {}", msg))
            .with_detail(payload.details.clone()),
        None => NormalizedError::new(
            ErrorCategory::Generic,
            format!("Error: {}", dump(&payload.raw)),
        ),
    }
}

fn is_rate_limited(text: &str) -> bool {
    text.contains("429")
        || text.to_ascii_lowercase().contains("too many requests")
        || text.contains("RESOURCE_EXHAUSTED")
}

#[derive(Debug, Default)]
struct EmbeddedError {
    status: Option<u16>,
    message: Option<String>,
}

/// Pull `error.message` / `message` out of a JSON object embedded in a string,
/// e.g. `"500 INTERNAL. {'error': {...}}"`.
fn extract_embedded_error(text: &str) -> Option<EmbeddedError> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let blob: Value = serde_json::from_str(&text[start..=end]).ok()?;

    let inner = blob.get("error").unwrap_or(&blob);
    let message = non_empty_str(inner.get("message"))
        .or_else(|| non_empty_str(Some(inner)))
        .or_else(|| non_empty_str(blob.get("message")));
    let status = inner
        .get("code")
        .and_then(status_from_value)
        .or_else(|| blob.get("status").and_then(status_from_value));

    if message.is_none() && status.is_none() {
        return None;
    }
    Some(EmbeddedError { status, message })
}

fn status_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn dump(raw: &Value) -> String {
    let text = match raw {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    if text.chars().count() > MAX_DUMP_CHARS {
        let truncated: String = text.chars().take(MAX_DUMP_CHARS).collect();
        format!("{}…", truncated)
    } else {
        text
    }
}
