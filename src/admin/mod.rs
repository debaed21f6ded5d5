//! Admin API: read-only views of the live rule snapshot.
//!
//! Served on its own listener and guarded by a bearer key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};

use crate::pipeline::Pipeline;

use self::auth::admin_auth_middleware;
use self::handlers::{get_limiters, get_rules, get_status};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub pipeline: Arc<Pipeline>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

pub fn setup_admin_router(pipeline: Arc<Pipeline>, api_key: &str) -> Router {
    let state = AdminState {
        pipeline,
        api_key: Arc::from(api_key),
        started_at: Instant::now(),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/rules", get(get_rules))
        .route("/admin/limiters", get(get_limiters))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
