//! Error types for Gatehouse

use hyper::StatusCode;

/// Main error type for Gatehouse operations
#[derive(Debug, thiserror::Error)]
pub enum GatehouseError {
    /// Login payload could not be decoded or has the wrong segment layout
    #[error("Malformed credentials: {0}")]
    MalformedCredentials(String),

    /// Unknown user, app mismatch, or bad password. The cases are merged on
    /// purpose so a caller cannot tell which check failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Token or nonce missing, malformed, expired, or already consumed
    #[error("Invalid token or nonce: {0}")]
    InvalidToken(String),

    /// Authenticated but lacking the declared permission
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatehouseError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures that should be recorded in the durable audit log
    /// and surfaced to the client only as a generic server error.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_) | Self::Config(_))
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for GatehouseError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GatehouseError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for GatehouseError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for GatehouseError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for Gatehouse operations
pub type Result<T> = std::result::Result<T, GatehouseError>;
