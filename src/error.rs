//! Error types shared by every pipeline stage.
//!
//! [`RagError`] carries a kind plus a human-readable message so callers can tell
//! retryable backend trouble apart from permanent validation failures.

use serde::Serialize;

/// Coarse classification of a [`RagError`], suitable for serialising to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    BackendUnavailable,
    Backend,
    Timeout,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Backend => "backend",
            Self::Timeout => "timeout",
            Self::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Empty text or query, unknown strategy, out-of-range parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A remote backend was requested but is not configured.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A remote backend answered with an error or an unreadable payload.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("backend timed out: {0}")]
    Timeout(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Backend(_) => ErrorKind::Backend,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Backend | ErrorKind::Timeout | ErrorKind::BackendUnavailable
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = RagError::invalid("query must not be empty");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "invalid argument: query must not be empty");
    }

    #[test]
    fn backend_errors_are_retryable() {
        assert!(RagError::Backend("502".into()).is_retryable());
        assert!(RagError::Timeout("30s".into()).is_retryable());
        assert!(RagError::BackendUnavailable("no endpoint".into()).is_retryable());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::BackendUnavailable).unwrap();
        assert_eq!(json, "\"backend_unavailable\"");
    }
}
