//! Inbound request handling.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Enforce the body size limit while buffering
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The whole body is buffered; overrides need the complete document
//! - Identity headers are left unparsed; the pipeline reads them only for
//!   rules that require an authority

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use uuid::Uuid;

use crate::error::{GatewayError, ValidationDetails};
use crate::pipeline::InboundRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID set by `SetRequestIdLayer`, or a fresh one outside the stack.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Buffer the body up to `max_body_bytes`.
pub async fn read_inbound(
    request: Request<Body>,
    max_body_bytes: usize,
) -> Result<InboundRequest, GatewayError> {
    let (parts, body) = request.into_parts();

    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, limit = max_body_bytes, "Rejected request body");
            GatewayError::RequestValidationFailed(ValidationDetails::global("body"))
        })?;

    Ok(InboundRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    })
}
