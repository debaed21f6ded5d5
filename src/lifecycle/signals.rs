//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::config::schema::GatewayConfig;
use crate::config::read_config;

/// Resolve when SIGINT or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}

/// Reload the config file on every SIGHUP until the receiver side closes.
#[cfg(unix)]
pub async fn reload_on_hangup(path: PathBuf, updates: mpsc::UnboundedSender<GatewayConfig>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for SIGHUP");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        tracing::info!(path = %path.display(), "SIGHUP received; reloading configuration");
        match read_config(&path) {
            Ok(config) => {
                if updates.send(config).is_err() {
                    break;
                }
            }
            Err(e) => tracing::error!(error = %e, "Configuration reload rejected"),
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_hangup(_path: PathBuf, _updates: mpsc::UnboundedSender<GatewayConfig>) {}
