//! Outbound request construction.
//!
//! # Responsibilities
//! - Resolve the rule's route to a target base URL
//! - Override query (and form) parameters in declaration order
//! - Merge top-level JSON body overrides
//! - Prepare forwarded headers for the backend
//!
//! # Design Decisions
//! - Rewriting is a pure function of rule + original request
//! - Overrides replace every existing value of a key, so re-applying them
//!   yields the same request
//! - Parameters that are not overridden are forwarded exactly as received
//! - Only top-level body keys can be overridden; nested paths are not
//!   addressable

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::discovery::ServiceResolver;
use crate::dispatch::{strip_hop_by_hop, OutboundRequest};
use crate::pipeline::context::InboundRequest;
use crate::routing::rule::{Route, RuleDefinition};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("service '{0}' could not be resolved")]
    UnresolvedService(String),

    #[error("request body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("request body must be a JSON object to apply field overrides")]
    NonObjectBody,

    #[error("could not build target URL: {0}")]
    InvalidTarget(String),
}

/// Builds the backend request for a matched rule.
#[derive(Clone)]
pub struct RequestRewriter {
    resolver: Arc<dyn ServiceResolver>,
}

impl RequestRewriter {
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Self {
        Self { resolver }
    }

    pub fn rewrite(
        &self,
        rule: &RuleDefinition,
        inbound: &InboundRequest,
    ) -> Result<OutboundRequest, RewriteError> {
        let base = match rule.route() {
            Route::Service(name) => self
                .resolver
                .resolve(name)
                .ok_or_else(|| RewriteError::UnresolvedService(name.clone()))?,
            Route::Uri(url) => url.clone(),
        };

        let mut url = target_url(&base, inbound.uri.path())?;
        let overrides = rule.request_params();
        if overrides.is_empty() {
            url.set_query(inbound.uri.query());
        } else {
            let query = override_params(inbound.uri.query().unwrap_or("").as_bytes(), overrides);
            if query.is_empty() {
                url.set_query(None);
            } else {
                url.set_query(Some(&String::from_utf8_lossy(&query)));
            }
        }

        let mut headers = inbound.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let mut body = inbound.body.clone();
        if !overrides.is_empty() && is_form(&headers) {
            body = Bytes::from(override_params(&body, overrides));
        }
        if !rule.request_body().is_empty() {
            body = merge_body(&body, rule.request_body())?;
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        headers.remove(header::CONTENT_LENGTH);
        if !body.is_empty() {
            headers.insert(header::CONTENT_LENGTH, body.len().into());
        }

        Ok(OutboundRequest {
            method: inbound.method.clone(),
            url,
            headers,
            body,
        })
    }
}

/// Join the request path onto the target base, keeping any base path prefix.
fn target_url(base: &Url, request_path: &str) -> Result<Url, RewriteError> {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    let path = if request_path.starts_with('/') {
        format!("{prefix}{request_path}")
    } else {
        format!("{prefix}/{request_path}")
    };
    url.set_path(&path);
    url.set_fragment(None);
    if url.cannot_be_a_base() {
        return Err(RewriteError::InvalidTarget(url.to_string()));
    }
    Ok(url)
}

/// Apply overrides, in order, to raw `application/x-www-form-urlencoded`
/// input. An override replaces the first segment with its key in place and
/// drops later duplicates; unknown keys are appended. Segments of other keys
/// are copied byte for byte.
pub fn override_params(raw: &[u8], overrides: &[(String, String)]) -> Vec<u8> {
    let mut segments: Vec<Vec<u8>> = if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(|b| *b == b'&').map(<[u8]>::to_vec).collect()
    };

    for (key, value) in overrides {
        let encoded = encode_pair(key, value);
        let mut replaced = false;
        segments.retain_mut(|segment| {
            if !segment_has_key(segment, key) {
                return true;
            }
            if replaced {
                return false;
            }
            *segment = encoded.clone();
            replaced = true;
            true
        });
        if !replaced {
            segments.push(encoded);
        }
    }

    segments.join(&b'&')
}

fn segment_has_key(segment: &[u8], key: &str) -> bool {
    form_urlencoded::parse(segment)
        .next()
        .map(|(k, _)| k == key)
        .unwrap_or(false)
}

fn encode_pair(key: &str, value: &str) -> Vec<u8> {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish()
        .into_bytes()
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Overwrite top-level keys of a JSON object body. An empty body is `{}`.
pub fn merge_body(body: &[u8], overrides: &Map<String, Value>) -> Result<Bytes, RewriteError> {
    let mut value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(body).map_err(RewriteError::MalformedBody)?
    };

    let object = value.as_object_mut().ok_or(RewriteError::NonObjectBody)?;
    for (key, replacement) in overrides {
        object.insert(key.clone(), replacement.clone());
    }

    serde_json::to_vec(&value)
        .map(Bytes::from)
        .map_err(RewriteError::MalformedBody)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RuleConfig;
    use crate::discovery::StaticServiceRegistry;
    use axum::http::{Method, Uri};
    use serde_json::json;

    fn rewriter() -> RequestRewriter {
        let mut registry = StaticServiceRegistry::default();
        registry.insert("user-service", Url::parse("http://10.0.0.5:8080").unwrap());
        RequestRewriter::new(Arc::new(registry))
    }

    fn inbound(method: Method, uri: &str, body: &str) -> InboundRequest {
        InboundRequest {
            method,
            uri: uri.parse::<Uri>().unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn compile(config: RuleConfig) -> RuleDefinition {
        RuleDefinition::compile(0, &config).unwrap()
    }

    #[test]
    fn test_service_route_passthrough() {
        let rule = compile(RuleConfig {
            path: "/users".into(),
            method: Some("GET".into()),
            service: Some("user-service".into()),
            ..RuleConfig::default()
        });

        let out = rewriter()
            .rewrite(&rule, &inbound(Method::GET, "/users?name=alice", ""))
            .unwrap();
        assert_eq!(out.url.as_str(), "http://10.0.0.5:8080/users?name=alice");
        assert!(out.body.is_empty());
        assert!(!out.headers.contains_key(header::CONTENT_LENGTH));
    }

    #[test]
    fn test_uri_route_keeps_base_path() {
        let rule = compile(RuleConfig {
            path: "/orders/**".into(),
            uri: Some("http://orders.internal:9000/v2/".into()),
            ..RuleConfig::default()
        });

        let out = rewriter()
            .rewrite(&rule, &inbound(Method::GET, "/orders/7", ""))
            .unwrap();
        assert_eq!(out.url.as_str(), "http://orders.internal:9000/v2/orders/7");
    }

    #[test]
    fn test_unresolved_service() {
        let rule = compile(RuleConfig {
            path: "/x".into(),
            service: Some("ghost".into()),
            ..RuleConfig::default()
        });
        let err = rewriter().rewrite(&rule, &inbound(Method::GET, "/x", "")).unwrap_err();
        assert!(matches!(err, RewriteError::UnresolvedService(ref s) if s == "ghost"));
    }

    #[test]
    fn test_param_overrides_in_order() {
        let overrides = vec![
            ("a".to_string(), "x".to_string()),
            ("c".to_string(), "y".to_string()),
            ("c".to_string(), "z".to_string()),
        ];
        let result = override_params(b"a=1&b=2&a=3", &overrides);
        assert_eq!(result, b"a=x&b=2&c=z");
        assert_eq!(override_params(b"", &overrides), b"a=x&c=z");
    }

    #[test]
    fn test_param_overrides_keep_other_segments_verbatim() {
        let overrides = vec![("source".to_string(), "gw".to_string())];
        assert_eq!(
            override_params(b"flag&tag=%FF&q=a%20b", &overrides),
            b"flag&tag=%FF&q=a%20b&source=gw"
        );
        assert_eq!(override_params(b"source=a%20b&flag", &overrides), b"source=gw&flag");
    }

    #[test]
    fn test_query_rewrite_leaves_unrelated_params_untouched() {
        let mut config = RuleConfig {
            path: "/search".into(),
            uri: Some("http://search:80".into()),
            ..RuleConfig::default()
        };
        config.request_param.insert("source".into(), json!("gw"));
        let rule = compile(config);

        let out = rewriter()
            .rewrite(&rule, &inbound(Method::GET, "/search?flag&tag=%FF&q=a%20b", ""))
            .unwrap();
        assert_eq!(out.url.query(), Some("flag&tag=%FF&q=a%20b&source=gw"));
    }

    #[test]
    fn test_param_rewrite_is_idempotent() {
        let mut config = RuleConfig {
            path: "/search".into(),
            uri: Some("http://search:80".into()),
            ..RuleConfig::default()
        };
        config.request_param.insert("limit".into(), json!("10"));
        config.request_param.insert("source".into(), json!("gateway"));
        let rule = compile(config);
        let rewriter = rewriter();

        let first = rewriter
            .rewrite(&rule, &inbound(Method::GET, "/search?q=rust&limit=500", ""))
            .unwrap();
        assert_eq!(first.url.query(), Some("q=rust&limit=10&source=gateway"));

        let again_uri = format!("/search?{}", first.url.query().unwrap());
        let second = rewriter
            .rewrite(&rule, &inbound(Method::GET, &again_uri, ""))
            .unwrap();
        assert_eq!(second.url, first.url);
    }

    #[test]
    fn test_form_body_params_overridden() {
        let mut config = RuleConfig {
            path: "/login".into(),
            uri: Some("http://auth:80".into()),
            ..RuleConfig::default()
        };
        config.request_param.insert("client".into(), json!("web"));
        let rule = compile(config);

        let mut req = inbound(Method::POST, "/login", "user=bob&client=evil");
        req.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let out = rewriter().rewrite(&rule, &req).unwrap();
        assert_eq!(&out.body[..], b"user=bob&client=web");
        assert_eq!(out.headers[header::CONTENT_LENGTH], out.body.len().to_string().as_str());
    }

    #[test]
    fn test_body_rewrite_preserves_other_keys() {
        let mut overrides = Map::new();
        overrides.insert("b".into(), json!(9));
        let merged = merge_body(br#"{"a":1,"b":2}"#, &overrides).unwrap();
        let value: Value = serde_json::from_slice(&merged).unwrap();
        assert_eq!(value, json!({"a": 1, "b": 9}));
    }

    #[test]
    fn test_body_rewrite_of_empty_body() {
        let mut overrides = Map::new();
        overrides.insert("role".into(), json!("user"));
        let merged = merge_body(b"", &overrides).unwrap();
        assert_eq!(&merged[..], br#"{"role":"user"}"#);
    }

    #[test]
    fn test_body_rewrite_failures() {
        let mut overrides = Map::new();
        overrides.insert("b".into(), json!(9));
        assert!(matches!(
            merge_body(b"not json", &overrides).unwrap_err(),
            RewriteError::MalformedBody(_)
        ));
        assert!(matches!(
            merge_body(b"[1,2]", &overrides).unwrap_err(),
            RewriteError::NonObjectBody
        ));
    }

    #[test]
    fn test_forwarded_headers() {
        let rule = compile(RuleConfig {
            path: "/x".into(),
            uri: Some("http://backend:80".into()),
            ..RuleConfig::default()
        });
        let mut req = inbound(Method::GET, "/x", "");
        req.headers.insert(header::HOST, HeaderValue::from_static("gateway.example"));
        req.headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        req.headers.insert("x-request-id", HeaderValue::from_static("abc"));

        let out = rewriter().rewrite(&rule, &req).unwrap();
        assert!(!out.headers.contains_key(header::HOST));
        assert!(!out.headers.contains_key(header::CONNECTION));
        assert_eq!(out.headers["x-request-id"], "abc");
    }
}
