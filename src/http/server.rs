//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all gateway handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Feed configuration updates to the pipeline
//! - Render pipeline results as backend responses or error envelopes

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::loader::ConfigError;
use crate::config::schema::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{read_inbound, request_id};
use crate::observability::metrics;
use crate::pipeline::{Collaborators, Pipeline, RequestContext};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub max_body_bytes: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    pipeline: Arc<Pipeline>,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server with the bundled resolver, authorizer and dispatcher.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(
        config: GatewayConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        let pipeline = Arc::new(Pipeline::new(&config, collaborators)?);
        let state = AppState {
            pipeline: pipeline.clone(),
            max_body_bytes: config.gateway.max_body_bytes,
        };

        Ok(Self {
            router: Self::build_router(state),
            pipeline,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    /// The router, for serving on a custom listener or driving with `oneshot`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve until shutdown, applying every configuration that arrives on
    /// `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rules = self.pipeline.snapshot().rules.len(),
            "HTTP server starting"
        );

        let pipeline = self.pipeline.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                // Rejections are logged inside reload.
                let _ = pipeline.reload(&config);
            }
        });

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

/// Catch-all handler: every request goes through the pipeline.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers());
    let path = request.uri().path().to_string();

    let inbound = match read_inbound(request, state.max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(err) => {
            tracing::warn!(request_id = %request_id, path = %path, error = %err, "Malformed request");
            metrics::record_error(err.kind());
            return render_error(&state, &path, &err);
        }
    };

    let ctx = state
        .pipeline
        .execute(RequestContext::new(request_id, inbound))
        .await;

    match ctx.into_result() {
        Ok(response) => response.into_response(),
        Err(err) => render_error(&state, &path, &err),
    }
}

fn render_error(state: &AppState, path: &str, err: &GatewayError) -> Response {
    let service = state.pipeline.snapshot().service_name.clone();
    err.reply(path, &service).into_response()
}
