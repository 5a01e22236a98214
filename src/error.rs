//! Chat backend error types with HTTP status code mapping.
//!
//! [`ChatError`] carries the backend's error taxonomy. Connection-local
//! and capability errors are handled where they occur; the type is only
//! surfaced to clients through the REST API, where each variant maps to a
//! status code and a structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::llm::CapabilityError;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: text must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Backend error taxonomy.
///
/// # Error Code Ranges
///
/// | Range     | Category     | HTTP Status                 |
/// |-----------|--------------|-----------------------------|
/// | 1000–1999 | Validation   | 400 Bad Request             |
/// | 2000–2999 | Connection   | 503 Service Unavailable     |
/// | 3000–3999 | Server       | 500 Internal Server Error   |
/// | 4000–4999 | Capability   | 502 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Connection-local transport failure; ends one session.
    #[error("transport error: {0}")]
    Transport(String),

    /// Generation capability is not configured.
    #[error("generation capability unavailable")]
    CapabilityUnavailable,

    /// Generation capability failed at runtime.
    #[error("capability error: {0}")]
    Capability(CapabilityError),

    /// The registry is shutting down and rejects new connections.
    #[error("registry closed")]
    RegistryClosed,

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Content was rejected by moderation.
    #[error("content rejected: {0}")]
    Rejected(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CapabilityError> for ChatError {
    fn from(e: CapabilityError) -> Self {
        match e {
            CapabilityError::Unavailable => Self::CapabilityUnavailable,
            other => Self::Capability(other),
        }
    }
}

impl ChatError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Rejected(_) => 1002,
            Self::Transport(_) => 2001,
            Self::RegistryClosed => 2002,
            Self::Internal(_) => 3000,
            Self::CapabilityUnavailable => 4001,
            Self::Capability(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) | Self::RegistryClosed | Self::CapabilityUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Capability(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
