//! Error types for the endpoint registry.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Client-caused rejections. None of these mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Index {index} is out of range for a roster of {member_count} members")]
    OutOfRange { index: i64, member_count: usize },

    #[error("Identity does not match the roster entry for index {index}")]
    IdentityMismatch { index: u32 },

    #[error("Invalid signature")]
    InvalidSignature,
}

/// Infrastructure failures from the endpoint store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage conflict: {0}")]
    Conflict(String),

    /// Only returned when opening a store whose file does not match the schema.
    #[error("Storage schema mismatch: {0}")]
    Schema(String),
}

/// Registry error types.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Body could not be parsed into the expected request shape.
    #[error("Invalid request: {message}")]
    InvalidRequest { status: StatusCode, message: String },

    #[error("No endpoint registered for index {0}")]
    NotFound(u32),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::Storage(
                StorageError::Unavailable(_) | StorageError::Timeout(_) | StorageError::Conflict(_)
            ) | RegistryError::RateLimitExceeded
        )
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            RegistryError::Validation(ValidationError::OutOfRange { .. }) => {
                (StatusCode::BAD_REQUEST, "OUT_OF_RANGE")
            }
            RegistryError::Validation(ValidationError::IdentityMismatch { .. }) => {
                (StatusCode::FORBIDDEN, "IDENTITY_MISMATCH")
            }
            RegistryError::Validation(ValidationError::InvalidSignature) => {
                (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE")
            }
            RegistryError::Storage(StorageError::Unavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
            }
            RegistryError::Storage(StorageError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "STORAGE_TIMEOUT")
            }
            RegistryError::Storage(StorageError::Conflict(_)) => {
                (StatusCode::CONFLICT, "STORAGE_CONFLICT")
            }
            RegistryError::Storage(StorageError::Schema(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_SCHEMA")
            }
            RegistryError::InvalidRequest { status, .. } => (*status, "INVALID_REQUEST"),
            RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            RegistryError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            RegistryError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Unavailable(format!("JSON serialization error: {}", e))
    }
}

impl From<JsonRejection> for RegistryError {
    fn from(rejection: JsonRejection) -> Self {
        RegistryError::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for RegistryError {
    fn from(e: tokio::task::JoinError) -> Self {
        RegistryError::Internal(format!("Store task failed: {}", e))
    }
}
