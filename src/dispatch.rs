//! Backend dispatch.
//!
//! # Responsibilities
//! - Perform the network call for a rewritten request
//! - Buffer the backend response for post-processing
//! - Distinguish "no response" from "unusable response"
//!
//! # Design Decisions
//! - No retries: a failed dispatch is a terminal error for the request
//! - The request timeout is enforced by the pipeline, around any dispatcher
//! - Hop-by-hop headers are stripped in both directions

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove connection-scoped headers that must not be forwarded.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// The request sent to the backend after rewriting.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A fully buffered backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No response was received.
    #[error("connection to backend failed: {0}")]
    Unavailable(String),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    /// A response arrived but could not be read.
    #[error("backend response unusable: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: OutboundRequest) -> Result<BackendResponse, DispatchError>;
}

/// Plain HTTP/1.1 and HTTP/2 dispatcher over a pooled hyper client.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: Client<HttpConnector, Body>,
    max_response_bytes: usize,
}

impl HttpDispatcher {
    pub fn new(connect_timeout: Duration, max_response_bytes: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            max_response_bytes,
        }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, request: OutboundRequest) -> Result<BackendResponse, DispatchError> {
        let mut builder = Request::builder()
            .method(request.method)
            .uri(request.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            *headers = request.headers;
        }
        let req = builder
            .body(Body::from(request.body))
            .map_err(|e| DispatchError::Unavailable(format!("invalid outbound request: {e}")))?;

        let response = self
            .client
            .request(req)
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_response_bytes)
            .await
            .map_err(|e| DispatchError::InvalidResponse(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.insert(header::CONTENT_LENGTH, body.len().into());

        Ok(BackendResponse {
            status: parts.status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let dispatcher = HttpDispatcher::new(Duration::from_millis(500), 1024);
        // Port 9 (discard) on localhost is closed in test environments.
        let request = OutboundRequest {
            method: Method::GET,
            url: Url::parse("http://127.0.0.1:9/").unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let err = dispatcher.dispatch(request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unavailable(_)));
    }
}
