//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] relay_storage::StorageError),

    #[error("registry error: {0}")]
    Registry(#[from] relay_registry::RegistryError),
}

impl From<relay_broker::BrokerError> for ApiError {
    fn from(err: relay_broker::BrokerError) -> Self {
        match err {
            relay_broker::BrokerError::UnknownPlugin(id) => {
                Self::NotFound(format!("plugin {id}"))
            }
            relay_broker::BrokerError::UnknownTask(id) => Self::NotFound(format!("task {id}")),
            relay_broker::BrokerError::InvalidParams(msg) => Self::BadRequest(msg),
            relay_broker::BrokerError::Unavailable(msg) => Self::BackendUnavailable(msg),
            relay_broker::BrokerError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Registry(_) => "registry_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                relay_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                relay_storage::StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                relay_storage::StorageError::SignatureExpired(_) => StatusCode::GONE,
                relay_storage::StorageError::InvalidSignature => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Registry(e) => match e {
                relay_registry::RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                relay_registry::RegistryError::AlreadyExists(_) => StatusCode::CONFLICT,
                relay_registry::RegistryError::InvalidStateTransition { .. } => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
