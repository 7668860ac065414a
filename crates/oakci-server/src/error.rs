//! HTTP error mapping.
//!
//! Handlers return [`ApiError`]; the body always carries a `detail`
//! field, and multi-step flows (cloud relay) add `phase`, `suggestion`,
//! and `status`. Unexpected errors become a generic 500 without the
//! underlying message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oakci_domain::error::Error;
use serde_json::json;
use tracing::error;

/// Typed API error.
#[derive(Debug)]
pub enum ApiError {
    /// 400 with a validation message.
    BadRequest(String),
    /// 404.
    NotFound(String),
    /// 409.
    Conflict(String),
    /// 413.
    PayloadTooLarge(String),
    /// 503 - a required component is missing or a provider is down.
    Unavailable(String),
    /// 504.
    Timeout(String),
    /// 500 with a generic body; the detail goes to the log only.
    Internal(String),
    /// Structured multi-step failure (cloud relay).
    Phased {
        status: StatusCode,
        detail: String,
        phase: String,
        suggestion: Option<String>,
    },
}

impl ApiError {
    /// Shorthand for a bad request.
    pub fn bad_request<S: Into<String>>(detail: S) -> Self {
        Self::BadRequest(detail.into())
    }

    /// Shorthand for a missing resource.
    pub fn not_found<S: Into<String>>(detail: S) -> Self {
        Self::NotFound(detail.into())
    }

    /// Shorthand for an unavailable component.
    pub fn unavailable<S: Into<String>>(detail: S) -> Self {
        Self::Unavailable(detail.into())
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        match &error {
            Error::InvalidArgument { message } => Self::BadRequest(message.clone()),
            Error::NotFound { resource } => Self::NotFound(format!("Not found: {resource}")),
            Error::Conflict { message } => Self::Conflict(message.clone()),
            Error::Timeout { message } => Self::Timeout(message.clone()),
            Error::Embedding { message } => Self::Unavailable(message.clone()),
            _ => Self::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, json!({ "detail": detail })),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, json!({ "detail": detail })),
            Self::Conflict(detail) => (StatusCode::CONFLICT, json!({ "detail": detail })),
            Self::PayloadTooLarge(detail) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "detail": detail }))
            }
            Self::Unavailable(detail) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "detail": detail }))
            }
            Self::Timeout(detail) => (StatusCode::GATEWAY_TIMEOUT, json!({ "detail": detail })),
            Self::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "internal server error" }),
                )
            }
            Self::Phased {
                status,
                detail,
                phase,
                suggestion,
            } => (
                status,
                json!({
                    "status": "error",
                    "detail": detail,
                    "phase": phase,
                    "suggestion": suggestion,
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Handler result alias.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
