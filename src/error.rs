//! Error types for the evaluation API.
//!
//! Every handler returns `ApiResult`, so each failure is converted to an HTTP
//! response at the handler boundary with a `{"detail": ...}` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned on every permission denial.
pub const PERMISSION_DENIED_MESSAGE: &str =
    "You do not have permission to perform this action. Please contact your organization admin.";

/// Unified error type for evaluation API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// The fixed 403 returned when an access check denies an action.
    pub fn permission_denied() -> Self {
        ApiError::Forbidden(PERMISSION_DENIED_MESSAGE.to_string())
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Database(_)
            | ApiError::Serialization(_)
            | ApiError::Queue(_)
            | ApiError::Config(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Prefix the message of server-side failures, leaving client errors as they are.
    pub fn with_context(self, context: &str) -> Self {
        if self.status_code().is_server_error() {
            ApiError::Internal(format!("{context}{self}"))
        } else {
            self
        }
    }
}

/// Error response body for API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ApiError::Forbidden(msg) => tracing::error!(detail = %msg, "Permission denied"),
            ApiError::Database(e) => tracing::error!(error = %e, "Database error"),
            _ if status.is_server_error() => tracing::error!(error = %self, "Internal error"),
            _ => tracing::debug!(status = %status, detail = %self, "Request rejected"),
        }

        let body = ErrorResponse {
            detail: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for evaluation API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::permission_denied().status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Queue("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_context_only_wraps_server_errors() {
        let err = ApiError::Internal("boom".into()).with_context("Could not load: ");
        assert_eq!(err.to_string(), "Could not load: boom");

        let err = ApiError::NotFound("App not found".into()).with_context("Could not load: ");
        assert_eq!(err.to_string(), "App not found");
    }

    #[test]
    fn test_permission_denied_detail() {
        assert_eq!(
            ApiError::permission_denied().to_string(),
            PERMISSION_DENIED_MESSAGE
        );
    }
}
