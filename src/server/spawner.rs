// src/server/spawner.rs

//! Spawns all of the server's long-running background tasks: the admin
//! HTTP surface, the Prometheus metrics exporter, and the periodic
//! session/registry sweeps.

use super::context::ServerContext;
use super::metrics_server;
use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const TOMBSTONE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawns all critical background tasks into the provided JoinSet.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let server_state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    let metrics_enabled = server_state.config.lock().unwrap_or_else(|e| e.into_inner()).metrics.enabled;

    // --- Admin HTTP surface ---
    let http_state = server_state.clone();
    let http_listener = ctx
        .http_listener
        .take()
        .ok_or_else(|| anyhow::anyhow!("HTTP listener already taken"))?;
    let mut http_shutdown_rx = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        let app = crate::http::router(http_state);
        axum::serve(
            http_listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            http_shutdown_rx.recv().await.ok();
            info!("Admin HTTP server shutting down.");
        })
        .await?;
        Ok(())
    });

    // --- Prometheus metrics server ---
    if metrics_enabled {
        let metrics_state = server_state.clone();
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_state, shutdown_rx_metrics).await;
            Ok(())
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // --- Session idle sweep (spec §4.B) ---
    let sweep_state = server_state.clone();
    let mut sweep_shutdown = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => sweep_state.sessions.sweep_idle().await,
                _ = sweep_shutdown.recv() => break,
            }
        }
        Ok(())
    });

    // --- Empty-service tombstone sweep (spec §4.C) ---
    let gc_state = server_state.clone();
    let mut gc_shutdown = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        let mut interval = tokio::time::interval(TOMBSTONE_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => gc_state.registry.sweep_tombstones().await,
                _ = gc_shutdown.recv() => break,
            }
        }
        Ok(())
    });

    info!("All background tasks have been spawned.");
    Ok(())
}
