//! Error types for the shelf and its server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for stores, policy layers and the HTTP front end.
///
/// A key that expired and a key that never existed both surface as
/// `NotFound`; callers cannot tell the two apart.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent, or expired at access time
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Direct access to the reserved expiry index record
    #[error("Cannot access protected key: {0}")]
    ProtectedKey(String),

    /// A policy bound was missing or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Policy-specific call on a handle without that policy
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Mutation attempted on a store opened read-only
    #[error("Store is read-only: {0}")]
    ReadOnly(String),

    /// Operation on a store or handle that was already closed
    #[error("Store is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::ProtectedKey(_) => StatusCode::FORBIDDEN,
            CacheError::InvalidConfig(_)
            | CacheError::InvalidRequest(_)
            | CacheError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            CacheError::ReadOnly(_) => StatusCode::CONFLICT,
            CacheError::Closed | CacheError::Io(_) | CacheError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the shelf.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::ProtectedKey("k".into()), StatusCode::FORBIDDEN),
            (
                CacheError::UnsupportedOperation("ttl".into()),
                StatusCode::BAD_REQUEST,
            ),
            (CacheError::ReadOnly("k".into()), StatusCode::CONFLICT),
            (CacheError::Closed, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_not_found_message_names_key() {
        let err = CacheError::NotFound("foo".to_string());
        assert_eq!(err.to_string(), "Key not found: foo");
    }
}
