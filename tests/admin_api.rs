//! Admin API over the live pipeline.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use rule_gateway::admin::setup_admin_router;
use rule_gateway::config::{GatewayConfig, RateLimiterConfig, RuleConfig};
use rule_gateway::{Collaborators, Pipeline};

const KEY: &str = "test-admin-key";

fn pipeline() -> Arc<Pipeline> {
    let mut config = GatewayConfig::default();
    config.rules = vec![
        RuleConfig {
            path: "/users/**".into(),
            method: Some("GET".into()),
            service: Some("user-service".into()),
            authority: vec!["admin".into()],
            rate_limiter: Some(RateLimiterConfig {
                capacity: 10,
                refill_per_second: 1.0,
            }),
            ..RuleConfig::default()
        },
        RuleConfig {
            path: "/health".into(),
            uri: Some("http://127.0.0.1:9000".into()),
            ..RuleConfig::default()
        },
    ];
    let collaborators = Collaborators::from_config(&config);
    Arc::new(Pipeline::new(&config, collaborators).unwrap())
}

async fn get(pipeline: Arc<Pipeline>, path: &str, key: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(path);
    if let Some(key) = key {
        request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    let response = setup_admin_router(pipeline, KEY)
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let (status, _) = get(pipeline(), "/admin/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(pipeline(), "/admin/status", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_reports_generation() {
    let pipeline = pipeline();
    let (status, body) = get(pipeline.clone(), "/admin/status", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["generation"], 1);
    assert_eq!(body["rules"], 2);
    assert_eq!(body["service"], "rule-gateway");

    let mut config = GatewayConfig::default();
    config.rules = vec![RuleConfig {
        path: "/only".into(),
        uri: Some("http://127.0.0.1:9000".into()),
        ..RuleConfig::default()
    }];
    pipeline.reload(&config).unwrap();

    let (_, body) = get(pipeline, "/admin/status", Some(KEY)).await;
    assert_eq!(body["generation"], 2);
    assert_eq!(body["rules"], 1);
}

#[tokio::test]
async fn test_rules_listed_in_match_order() {
    let (status, body) = get(pipeline(), "/admin/rules", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);

    let rules = body.as_array().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0]["index"], 0);
    assert_eq!(rules[0]["path"], "/users/**");
    assert_eq!(rules[0]["method"], "GET");
    assert_eq!(rules[0]["route"], "service:user-service");
    assert_eq!(rules[0]["authority"], serde_json::json!(["admin"]));
    assert_eq!(rules[0]["rate_limiter"]["capacity"], 10);
    assert_eq!(rules[1]["method"], Value::Null);
    assert!(rules[1]["rate_limiter"].is_null());
}

#[tokio::test]
async fn test_limiters_show_lazy_allocation() {
    let (status, body) = get(pipeline(), "/admin/limiters", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);

    let limiters = body.as_array().unwrap();
    assert_eq!(limiters.len(), 1);
    assert_eq!(limiters[0]["rule"], 0);
    assert_eq!(limiters[0]["capacity"], 10);
    assert!(limiters[0]["available"].is_null());
}
