//! Error types for Docent

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

/// Which stage of the pipeline produced an error.
///
/// `Fetch` never reaches a caller: document failures are absorbed by the
/// fallback and only appear in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    Fetch,
    Completion,
    Config,
    Validation,
    RateLimit,
    Server,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorOrigin::Fetch => "fetch",
            ErrorOrigin::Completion => "completion",
            ErrorOrigin::Config => "config",
            ErrorOrigin::Validation => "validation",
            ErrorOrigin::RateLimit => "rate_limit",
            ErrorOrigin::Server => "server",
        };
        f.write_str(name)
    }
}

/// Main error type for Docent operations
#[derive(Error, Debug)]
pub enum DocentError {
    /// Rejected user input (empty, oversized, malformed)
    #[error("{0}")]
    Validation(String),

    /// Caller exceeded the sliding request window
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },

    /// Configuration errors (missing credential, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Completion provider failure. `status` is present only when the
    /// provider actually answered.
    #[error("{message}")]
    Completion {
        status: Option<u16>,
        message: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Listener / serving errors
    #[error("Server error: {0}")]
    Server(String),
}

impl DocentError {
    /// Create a completion error carrying the provider's status
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        DocentError::Completion {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a completion error for a call that got no response at all
    pub fn transport(message: impl Into<String>) -> Self {
        DocentError::Completion {
            status: None,
            message: message.into(),
        }
    }

    /// The pipeline stage this error belongs to
    pub fn origin(&self) -> ErrorOrigin {
        match self {
            DocentError::Validation(_) => ErrorOrigin::Validation,
            DocentError::RateLimited { .. } => ErrorOrigin::RateLimit,
            DocentError::Completion { .. } => ErrorOrigin::Completion,
            DocentError::Config(_) => ErrorOrigin::Config,
            DocentError::Io(_) | DocentError::Server(_) => ErrorOrigin::Server,
        }
    }

    /// HTTP status reported to the caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            DocentError::Validation(_) => StatusCode::BAD_REQUEST,
            DocentError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            DocentError::Completion {
                status: Some(code), ..
            } => StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            DocentError::Completion { status: None, .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DocentError::Config(_) | DocentError::Io(_) | DocentError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Result type alias for Docent operations
pub type Result<T> = std::result::Result<T, DocentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_passes_through() {
        let err = DocentError::upstream(401, "No auth credentials found");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "No auth credentials found");
        assert_eq!(err.origin(), ErrorOrigin::Completion);
    }

    #[test]
    fn transport_failure_is_internal_error() {
        let err = DocentError::transport("connection refused");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn nonsense_upstream_status_falls_back_to_500() {
        let err = DocentError::upstream(1000, "weird");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn boundary_statuses() {
        assert_eq!(
            DocentError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DocentError::RateLimited {
                message: "slow down".into(),
                retry_after_secs: 3
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            DocentError::Config("missing key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ErrorOrigin::RateLimit.to_string(), "rate_limit");
    }

    #[test]
    fn serving_failures_are_not_config_errors() {
        let bind = DocentError::Server("Failed to bind to 0.0.0.0:80".into());
        assert_eq!(bind.origin(), ErrorOrigin::Server);
        let io = DocentError::from(std::io::Error::other("disk gone"));
        assert_eq!(io.origin(), ErrorOrigin::Server);
        assert_eq!(io.origin().to_string(), "server");
        assert_eq!(
            DocentError::Config("missing key".into()).origin(),
            ErrorOrigin::Config
        );
    }
}
