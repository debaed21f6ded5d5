//! Runtime error taxonomy and the caller-facing error envelope.
//!
//! # Responsibilities
//! - Classify every terminal pipeline failure into an [`ErrorKind`]
//! - Map kinds to HTTP status codes and stable envelope codes
//! - Render the JSON envelope returned to callers
//!
//! # Design Decisions
//! - Configuration errors live in `config::loader`; they never reach a caller
//! - `UnknownError` carries the original message as `details`
//! - Envelope timestamps are server time, RFC 3339

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Classification of a terminal pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RouteNotFound,
    Forbidden,
    RateLimited,
    RewriteFailed,
    BackendUnavailable,
    BackendError,
    RequestValidationFailed,
    UnknownError,
}

impl ErrorKind {
    /// Stable code written to the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::RouteNotFound => "ROUTE_NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::RewriteFailed => "REWRITE_FAILED",
            ErrorKind::BackendUnavailable => "BACKEND_UNAVAILABLE",
            ErrorKind::BackendError => "BACKEND_ERROR",
            ErrorKind::RequestValidationFailed => "REQUEST_VALIDATION_FAILED",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::RouteNotFound => "route_not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::RewriteFailed => "rewrite_failed",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::BackendError => "backend_error",
            ErrorKind::RequestValidationFailed => "request_validation_failed",
            ErrorKind::UnknownError => "unknown_error",
        }
    }
}

/// Names of the request fields that failed shape validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationDetails {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global: Vec<String>,
}

impl ValidationDetails {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            field: vec![name.into()],
            global: Vec::new(),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self {
            field: Vec::new(),
            global: vec![name.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty() && self.global.is_empty()
    }
}

/// A terminal failure of one request's pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("access denied: caller lacks any of the required authorities")]
    Forbidden { required: Vec<String> },

    #[error("rate limit exceeded for rule #{rule}")]
    RateLimited { rule: usize },

    #[error("request rewrite failed: {0}")]
    RewriteFailed(String),

    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String, timed_out: bool },

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("request validation failed")]
    RequestValidationFailed(ValidationDetails),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            GatewayError::Forbidden { .. } => ErrorKind::Forbidden,
            GatewayError::RateLimited { .. } => ErrorKind::RateLimited,
            GatewayError::RewriteFailed(_) => ErrorKind::RewriteFailed,
            GatewayError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            GatewayError::BackendError(_) => ErrorKind::BackendError,
            GatewayError::RequestValidationFailed(_) => ErrorKind::RequestValidationFailed,
            GatewayError::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// HTTP status for this failure. Backend timeouts map to 504, other
    /// unavailability to 502.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RewriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::BackendUnavailable { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::BackendError(_) => StatusCode::BAD_GATEWAY,
            GatewayError::RequestValidationFailed(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            GatewayError::RequestValidationFailed(details) if !details.is_empty() => {
                serde_json::to_value(details).ok()
            }
            GatewayError::RewriteFailed(reason) | GatewayError::BackendError(reason) => {
                Some(Value::String(reason.clone()))
            }
            GatewayError::Unknown(message) => Some(Value::String(message.clone())),
            _ => None,
        }
    }

    /// Build the caller-facing reply for this error.
    pub fn reply(&self, path: &str, service: &str) -> ErrorReply {
        ErrorReply {
            status: self.status(),
            envelope: ErrorEnvelope {
                code: self.kind().code().to_string(),
                message: self.to_string(),
                details: self.details(),
                path: path.to_string(),
                timestamp: Utc::now(),
                service: service.to_string(),
            },
        }
    }
}

/// JSON body emitted on every errored request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
}

/// Status plus envelope, ready to be written to the client.
#[derive(Debug, Clone)]
pub struct ErrorReply {
    pub status: StatusCode,
    pub envelope: ErrorEnvelope,
}

impl IntoResponse for ErrorReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
