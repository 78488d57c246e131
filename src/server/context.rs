// src/server/context.rs

use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
/// Two listeners, one process: the admin/console HTTP surface (spec §6's
/// `/v1`, `/v2`, `/v3` families) and the bidirectional RPC surface
/// (conventionally `port + 1000`), both bound during `initialization::setup`
/// and driven from `connection_loop::run` and `spawner::spawn_all`
/// respectively.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub rpc_listener: TcpListener,
    /// Taken by `spawner::spawn_all` to drive the admin HTTP server task.
    pub http_listener: Option<TcpListener>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    pub connection_permits: Arc<Semaphore>,
}
