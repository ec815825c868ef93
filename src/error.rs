//! Board error types with HTTP status code mapping.
//!
//! [`BoardError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! The mapping happens in exactly one place, [`BoardError::into_response`],
//! at the dispatcher boundary.

use axum::http::header::ALLOW;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "text must not be empty"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Short, non-sensitive error message.
    pub message: String,
}

/// Diagnostic detail of a failed store operation.
///
/// Carries the text of the underlying driver error. It is logged, never
/// sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StoreFailure(String);

impl StoreFailure {
    /// Wraps a diagnostic message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<sqlx::Error> for StoreFailure {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

/// Service error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status                 |
/// |-----------|------------|-----------------------------|
/// | 1000–1999 | Client     | 400 Bad Request / 405       |
/// | 3000–3999 | Server     | 500 Internal Server Error   |
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A handle to the store could not be obtained.
    #[error("database connection unavailable: {0}")]
    Connection(StoreFailure),

    /// The schema bootstrap statement failed.
    #[error("schema bootstrap failed: {0}")]
    Schema(StoreFailure),

    /// Malformed caller input, detected before any store access.
    #[error("{0}")]
    Validation(String),

    /// A store operation failed after a handle was obtained.
    #[error("query failed: {0}")]
    Query(StoreFailure),

    /// The endpoint does not serve this HTTP method.
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
}

impl BoardError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::MethodNotAllowed(_) => 1002,
            Self::Connection(_) => 3001,
            Self::Schema(_) => 3002,
            Self::Query(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Connection(_) | Self::Schema(_) | Self::Query(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the message that is safe to show to clients.
    ///
    /// Server-side variants collapse to a generic message; their detail
    /// only goes to the log.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(_) | Self::MethodNotAllowed(_) => self.to_string(),
            Self::Connection(_) => "database unavailable".to_string(),
            Self::Schema(_) => "database initialization failed".to_string(),
            Self::Query(_) => "database operation failed".to_string(),
        }
    }

    /// Returns `true` for errors caused by the caller rather than the store.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MethodNotAllowed(_))
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        if self.is_client_error() {
            tracing::debug!(code, error = %self, "request rejected");
        } else {
            tracing::error!(code, error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: self.public_message(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        if matches!(self, Self::MethodNotAllowed(_)) {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, POST"));
        }
        response
    }
}
