//! Rule-driven API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ pipeline ─────────────────────────────┐
//!                     (request id,    match rule (first wins)               │
//!                      body limit)    authorize (any-of authority)          │
//!                                     rate limit (token bucket per rule)    │
//!                                     rewrite (target, params, body)        │
//!                                     dispatch ─────────────────────────────┼──▶ Backend
//!     Client Response                 post-process (status, headers, body)  │
//!     ◀────────────── backend response or error envelope ◀──────────────────┘
//!
//!     Cross-cutting: config + hot reload, observability, admin API, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rule_gateway::admin::setup_admin_router;
use rule_gateway::config::watcher::ConfigWatcher;
use rule_gateway::config::{read_config, GatewayConfig};
use rule_gateway::lifecycle::signals::{reload_on_hangup, shutdown_signal};
use rule_gateway::observability::{init_logging, metrics};
use rule_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "rule-gateway")]
#[command(about = "Rule-driven API gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload rules when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => GatewayConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!("rule-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        rules = config.rules.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (update_tx, update_rx) = mpsc::unbounded_channel();
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, mut watched) = ConfigWatcher::new(path);
            let forward = update_tx.clone();
            tokio::spawn(async move {
                while let Some(config) = watched.recv().await {
                    if forward.send(config).is_err() {
                        break;
                    }
                }
            });
            Some(watcher.run()?)
        }
        _ => None,
    };
    if let Some(path) = &args.config {
        tokio::spawn(reload_on_hangup(path.clone(), update_tx.clone()));
    }
    drop(update_tx);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone())?;

    if config.admin.enabled {
        if config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
            tracing::warn!("Admin API is using the placeholder API key");
        }
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(server.pipeline(), &config.admin.api_key);
        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, update_rx, server_shutdown));

    shutdown_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
