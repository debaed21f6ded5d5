//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Rule entries use camelCase keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway-wide settings (application name, body limits).
    pub gateway: GatewaySettings,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Where caller identity is read from.
    pub authorization: AuthorizationConfig,

    /// Logical service name -> base URL, used by the static resolver.
    pub services: BTreeMap<String, String>,

    /// Routing rules, in declaration (= priority) order.
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Application name, reported as `service` in error envelopes.
    pub name: String,

    /// Maximum inbound body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum backend response size in bytes.
    pub max_response_bytes: usize,

    /// Reject rules naming a service missing from `[services]`.
    pub strict_services: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            name: "rule-gateway".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            max_response_bytes: 10 * 1024 * 1024,
            strict_services: false,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-request dispatch timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Headers carrying the identity established by the upstream auth layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Comma-separated list of roles held by the caller.
    pub roles_header: String,

    /// Caller principal, used for logging only.
    pub principal_header: String,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            roles_header: "x-auth-roles".to_string(),
            principal_header: "x-auth-user".to_string(),
        }
    }
}

/// One routing rule: predicate, route, rewrite and post-processing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleConfig {
    /// Path pattern to match. Required.
    pub path: String,

    /// HTTP method to match; absent matches any method.
    pub method: Option<String>,

    /// Token bucket for this rule; absent means unlimited.
    pub rate_limiter: Option<RateLimiterConfig>,

    /// Roles of which the caller must hold at least one.
    pub authority: Vec<String>,

    /// Logical backend service name.
    pub service: Option<String>,

    /// Literal backend base URI.
    pub uri: Option<String>,

    /// Query/form parameter overrides, applied in order.
    pub request_param: Map<String, Value>,

    /// Top-level JSON body field overrides.
    pub request_body: Map<String, Value>,

    /// Response transformations, applied in order.
    pub post_processing: Vec<PostProcessingStep>,

    /// Advisory only; header hardening is not performed by the gateway.
    pub secure_http_headers: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            method: None,
            rate_limiter: None,
            authority: Vec::new(),
            service: None,
            uri: None,
            request_param: Map::new(),
            request_body: Map::new(),
            post_processing: Vec::new(),
            secure_http_headers: true,
        }
    }
}

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterConfig {
    /// Bucket size; also the burst allowance.
    pub capacity: u32,

    /// Tokens added per second.
    pub refill_per_second: f64,
}

/// A single response transformation, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PostProcessingStep {
    /// Replace the response status code.
    SetStatus { code: u16 },
    /// Drop a response header.
    RemoveHeader { name: String },
    /// Move a header's values under a new name.
    RenameHeader { from: String, to: String },
    /// Insert or replace a response header.
    SetHeader { name: String, value: String },
    /// Set a top-level field of a JSON object body.
    SetBodyField { field: String, value: Value },
    /// Remove a top-level field of a JSON object body.
    RemoveBodyField { field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_from_toml() {
        let raw = r#"
            [gateway]
            name = "edge"

            [services]
            user-service = "http://127.0.0.1:3000"

            [[rules]]
            path = "/users"
            method = "GET"
            service = "user-service"
            authority = ["admin", "ops"]
            rateLimiter = { capacity = 5, refillPerSecond = 2.5 }
            requestParam = { source = "gateway", zone = "eu" }
            requestBody = { b = 9 }

            [[rules.postProcessing]]
            type = "setStatus"
            code = 201

            [[rules.postProcessing]]
            type = "renameHeader"
            from = "x-internal"
            to = "x-public"
        "#;

        let config: GatewayConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.gateway.name, "edge");
        assert_eq!(config.services["user-service"], "http://127.0.0.1:3000");

        let rule = &config.rules[0];
        assert_eq!(rule.method.as_deref(), Some("GET"));
        assert_eq!(rule.rate_limiter, Some(RateLimiterConfig { capacity: 5, refill_per_second: 2.5 }));
        assert!(rule.secure_http_headers);
        let keys: Vec<_> = rule.request_param.keys().cloned().collect();
        assert_eq!(keys, vec!["source", "zone"]);
        assert_eq!(rule.post_processing[0], PostProcessingStep::SetStatus { code: 201 });
        assert_eq!(
            rule.post_processing[1],
            PostProcessingStep::RenameHeader { from: "x-internal".into(), to: "x-public".into() }
        );
    }

    #[test]
    fn test_unknown_post_processing_type_rejected() {
        let raw = r#"
            [[rules]]
            path = "/x"
            uri = "http://localhost:1"
            postProcessing = [{ type = "teleport" }]
        "#;
        assert!(toml::from_str::<GatewayConfig>(raw).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.authorization.roles_header, "x-auth-roles");
        assert!(config.rules.is_empty());
    }
}
