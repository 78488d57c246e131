// src/http/health.rs

//! Liveness/readiness probes (spec §6 "Health"):
//! `/v3/console/health/{liveness,readiness}`. Unauthenticated, matching the
//! real server (a load balancer or orchestrator polling these shouldn't
//! need a token).

use crate::core::state::ServerState;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use std::sync::Arc;

async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready once the session manager and registry have finished initializing,
/// which by construction is true the moment `ServerState` exists — this
/// mirrors the teacher's own `/metrics` habit of never gating readiness on
/// anything beyond "the process is up", since this server has no
/// persistence layer to warm.
async fn readiness(State(state): State<Arc<ServerState>>) -> StatusCode {
    let _ = &state;
    StatusCode::OK
}

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/v3/console/health/liveness", get(liveness))
        .route("/v3/console/health/readiness", get(readiness))
}
