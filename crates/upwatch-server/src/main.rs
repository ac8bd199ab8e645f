use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use upwatch_server::config::ServerConfig;
use upwatch_server::scheduler;
use upwatch_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("upwatch=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        ServerConfig::load(&config_path)?
    } else {
        info!(path = %config_path, "Config file not found, using defaults");
        ServerConfig::default()
    };

    upwatch_common::id::init(config.machine_id, config.node_id);

    let state = AppState::new(config)?;
    let cancel = CancellationToken::new();
    let handles = scheduler::spawn_all(&state, cancel.clone());
    info!("upwatch engine started");

    shutdown_signal().await;
    info!("Shutdown signal received, stopping schedulers");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                info!("Received Ctrl+C");
            }
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C");
}
