//! Notion API client error types.

use std::sync::Arc;

/// Errors from the Notion query client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotionError {
    /// No integration token configured.
    #[error("missing API token: TAGCACHE_NOTION_TOKEN not set")]
    MissingToken,

    /// Authentication failed (invalid or revoked token).
    #[error("authentication failed: invalid integration token")]
    AuthError,

    /// Rate limited by the Notion API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl NotionError {
    /// Connectivity failures, as opposed to the server rejecting the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, NotionError::Timeout | NotionError::Network(_))
    }
}

impl From<reqwest::Error> for NotionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { NotionError::Timeout } else { NotionError::Network(Arc::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotionError::MissingToken;
        assert!(err.to_string().contains("API token"));

        let err = NotionError::HttpError { status: 502 };
        assert_eq!(err.to_string(), "HTTP error: 502");
    }

    #[test]
    fn test_is_transient() {
        assert!(NotionError::Timeout.is_transient());
        assert!(!NotionError::AuthError.is_transient());
        assert!(!NotionError::Parse("x".into()).is_transient());
    }
}
