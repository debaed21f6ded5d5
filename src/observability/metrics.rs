//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by rule, method, status
//! - `gateway_request_duration_seconds` (histogram): pipeline latency by rule
//! - `gateway_rejections_total` (counter): terminal errors by kind
//! - `gateway_post_processing_degraded_total` (counter): aborted post-processing by rule
//! - `gateway_config_reloads_total` (counter): reload attempts by result

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ErrorKind;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(rule: &str, method: &str, status: u16, start: Instant) {
    let rule = rule.to_string();
    metrics::counter!(
        "gateway_requests_total",
        "rule" => rule.clone(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "rule" => rule)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_error(kind: ErrorKind) {
    metrics::counter!("gateway_rejections_total", "kind" => kind.label()).increment(1);
}

pub fn record_degraded(rule: &str) {
    metrics::counter!("gateway_post_processing_degraded_total", "rule" => rule.to_string())
        .increment(1);
}

pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "rejected" };
    metrics::counter!("gateway_config_reloads_total", "result" => result).increment(1);
}
