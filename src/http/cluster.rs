// src/http/cluster.rs

//! Cluster introspection (spec §6 "Cluster V2/V3"). This server runs as a
//! single node (clustering/gossip is outside this crate's scope, see
//! DESIGN.md), so these endpoints describe a one-member "cluster" rather
//! than proxying real peer state — the same shape the real API returns,
//! trivially specialized.

use crate::core::protocol::respond;
use crate::core::state::ServerState;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ClusterNode {
    pub ip: String,
    pub port: u16,
    pub state: &'static str,
    pub extend_info: ClusterNodeExtendInfo,
}

#[derive(Debug, Serialize)]
pub struct ClusterNodeExtendInfo {
    #[serde(rename = "raftMetaData")]
    pub raft_meta_data: Option<()>,
    pub version: &'static str,
}

fn self_node(state: &ServerState) -> ClusterNode {
    let cfg = state.config.lock().unwrap_or_else(|e| e.into_inner());
    ClusterNode {
        ip: cfg.host.clone(),
        port: cfg.port,
        state: "UP",
        extend_info: ClusterNodeExtendInfo { raft_meta_data: None, version: env!("CARGO_PKG_VERSION") },
    }
}

async fn node_self(State(state): State<Arc<ServerState>>) -> axum::response::Response {
    respond(Ok::<_, crate::core::errors::NacosError>(self_node(&state)), false)
}

async fn node_list(State(state): State<Arc<ServerState>>) -> axum::response::Response {
    respond(Ok::<_, crate::core::errors::NacosError>(vec![self_node(&state)]), false)
}

async fn health(State(state): State<Arc<ServerState>>) -> axum::response::Response {
    let _ = &state;
    respond(Ok::<_, crate::core::errors::NacosError>("UP"), false)
}

/// `/v2/core/cluster/node/*`: unauthenticated, matching the real server's
/// habit of exposing node health/self identity to any caller that can
/// already reach the admin port.
pub fn public_router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/v2/core/cluster/node/self", get(node_self))
        .route("/v2/core/cluster/node/list", get(node_list))
        .route("/v2/core/cluster/node/health", get(health))
}

/// `/v3/console/cluster/*`, behind the standard admin auth layer.
pub fn console_router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/v3/console/cluster/node/self", get(node_self))
        .route("/v3/console/cluster/node/list", get(node_list))
}
