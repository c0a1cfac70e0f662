//! Error types for rialto

use hyper::StatusCode;

use crate::store::StoreError;

/// Main error type for rialto operations
#[derive(Debug, thiserror::Error)]
pub enum RialtoError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// No content is left to serve for this cursor. A normal terminal state
    /// of "load more", not a failure.
    #[error("Feed exhausted: {0}")]
    Exhausted(String),

    /// The backing partition is temporarily down; callers may retry.
    #[error("Section unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RialtoError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            // Exhausted and unavailable stay 2xx-adjacent so clients treat
            // them as "nothing right now", not as request failures.
            Self::Exhausted(_) => StatusCode::NO_CONTENT,
            Self::Unavailable(_) => StatusCode::NO_CONTENT,
            Self::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::WebSocket(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<StoreError> for RialtoError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::OutOfRange(msg) => Self::Exhausted(msg),
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            StoreError::Transport(msg) => Self::Backend(msg),
        }
    }
}

impl From<std::io::Error> for RialtoError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RialtoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for RialtoError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RialtoError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// Result type alias for rialto operations
pub type Result<T> = std::result::Result<T, RialtoError>;
