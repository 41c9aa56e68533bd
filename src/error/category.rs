//! Coarse classes of agent-server failure.

use std::fmt;

/// What kind of failure a backend error represents.
///
/// Picks the canonical message shown to the user and whether sending the
/// same message again could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Quota or throttling (HTTP 429, `RESOURCE_EXHAUSTED`)
    RateLimit,
    /// The model provider rejected the server's credentials
    Auth,
    /// 5xx from the agent server
    Server,
    /// No HTTP response at all
    Network,
    Generic,
}

impl ErrorCategory {
    /// Category implied by an HTTP status, for error statuses we recognize.
    pub fn from_status(status: u16) -> Option<Self> {
        Some(match status {
            429 => Self::RateLimit,
            401 | 403 => Self::Auth,
            500..=599 => Self::Server,
            _ => return None,
        })
    }

    /// Transient failures that may clear up on their own.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Server | Self::Network)
    }

    /// Label used in log fields.
    pub fn label(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Server => "server",
            Self::Network => "network",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (429, Some(ErrorCategory::RateLimit)),
            (401, Some(ErrorCategory::Auth)),
            (403, Some(ErrorCategory::Auth)),
            (502, Some(ErrorCategory::Server)),
            (404, None),
            (200, None),
        ];
        for (status, expected) in cases {
            assert_eq!(ErrorCategory::from_status(status), expected, "status {}", status);
        }
    }

    #[test]
    fn test_auth_is_not_retryable() {
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Generic.is_retryable());
        assert!(ErrorCategory::RateLimit.is_retryable());
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "rate_limit");
        assert_eq!(ErrorCategory::Network.to_string(), ErrorCategory::Network.label());
    }
}
