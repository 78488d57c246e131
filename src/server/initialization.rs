// src/server/initialization.rs

//! Handles the complete server initialization process: configuration
//! resolution, state construction, and binding the two listeners (admin
//! HTTP on `config.port`, bidirectional RPC on `config.rpc_port()`).

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, reload};

/// Initializes all server components before starting the main loop.
pub async fn setup(
    config: Config,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<ServerContext> {
    log_startup_info(&config);

    let http_addr = (config.host.as_str(), config.port);
    let rpc_addr = (config.host.as_str(), config.rpc_port());

    let server_init = ServerState::initialize(config.clone(), log_reload_handle)?;
    let state = server_init.state;
    info!("Server state initialized.");

    let http_listener = TcpListener::bind(http_addr).await?;
    info!("Admin HTTP surface listening on {}:{}", config.host, config.port);

    let rpc_listener = TcpListener::bind(rpc_addr).await?;
    info!("RPC surface listening on {}:{}", config.host, config.rpc_port());

    let connection_permits = Arc::new(Semaphore::new(config.max_clients));
    let shutdown_tx = state.shutdown_tx.clone();

    Ok(ServerContext {
        state,
        rpc_listener,
        http_listener: Some(http_listener),
        shutdown_tx,
        background_tasks: JoinSet::new(),
        connection_permits,
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!("Starting in STANDALONE mode.");
    info!("max_clients set to {}.", config.max_clients);
    if config.auth.enabled {
        info!("Authentication is ENABLED.");
    } else {
        tracing::warn!("Authentication is DISABLED. Every request is treated as the root principal.");
    }
}
