use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::config::schema::RateLimiterConfig;
use crate::security::LimiterStatus;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub service: String,
    pub generation: u64,
    pub rules: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct RuleSummary {
    pub index: usize,
    pub path: String,
    pub method: Option<String>,
    pub route: String,
    pub authority: Vec<String>,
    pub rate_limiter: Option<RateLimiterConfig>,
    pub post_processing_steps: usize,
    pub secure_http_headers: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.pipeline.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        service: snapshot.service_name.clone(),
        generation: snapshot.generation,
        rules: snapshot.rules.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn get_rules(State(state): State<AdminState>) -> Json<Vec<RuleSummary>> {
    let snapshot = state.pipeline.snapshot();
    let rules = snapshot
        .rules
        .rules()
        .iter()
        .map(|rule| RuleSummary {
            index: rule.id().0,
            path: rule.path().to_string(),
            method: rule.method().map(ToString::to_string),
            route: rule.route().to_string(),
            authority: rule.authority().iter().cloned().collect(),
            rate_limiter: rule.rate_limiter().copied(),
            post_processing_steps: rule.post_processing().len(),
            secure_http_headers: rule.secure_headers(),
        })
        .collect();
    Json(rules)
}

pub async fn get_limiters(State(state): State<AdminState>) -> Json<Vec<LimiterStatus>> {
    let snapshot = state.pipeline.snapshot();
    Json(snapshot.limiters.status(snapshot.rules.rules()))
}
