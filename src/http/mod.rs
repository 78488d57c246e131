// src/http/mod.rs

//! The admin/console HTTP surface (spec §6 "HTTP endpoint families"):
//! auth, IAM (users/roles/permissions), namespaces, cluster introspection,
//! config console, naming console, and health probes.
//!
//! The teacher's own axum usage is a single `/metrics` route wired by hand
//! in `server::metrics_server`; this module's per-concern-file router
//! composition (`auth`, `iam`, `namespace`, `cluster`, `config`, `naming`,
//! `health`, each exposing its own `router()` merged here) is grounded on
//! the `api::router()` pattern from the pack's SerialAgent-style console
//! surface, adapted to this crate's `Arc<ServerState>` app state.

mod auth;
mod cluster;
mod config;
mod health;
mod iam;
mod naming;
mod namespace;

use crate::core::acl::Action;
use crate::core::errors::NacosError;
use crate::core::state::ServerState;
use axum::Router;
use axum::extract::{Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;

/// The authenticated principal for the current request, if any. Inserted
/// into request extensions by [`auth_middleware`]; handlers that need to
/// authorize a specific resource pull it back out.
#[derive(Debug, Clone)]
pub struct Principal(pub Option<String>);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

/// Verifies the bearer token carried either as `Authorization: Bearer ...`
/// or the legacy `accessToken` query parameter (spec §6: "Authentication by
/// accessToken query parameter or Authorization header"), and stashes the
/// resulting principal on the request. Auth-disabled deployments and the
/// handful of always-public routes (login, health) skip this layer
/// entirely — see `router()`.
async fn auth_middleware(State(state): State<Arc<ServerState>>, mut req: Request, next: Next) -> Response {
    if !state.iam.auth_enabled() {
        req.extensions_mut().insert(Principal(None));
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").map(str::to_string))
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(req.uri())
                .ok()
                .and_then(|q| q.0.access_token)
        });

    let Some(token) = token else {
        return crate::core::protocol::respond::<()>(Err(NacosError::Unauthenticated), false);
    };

    match state.iam.verify(&token) {
        Ok(username) => {
            req.extensions_mut().insert(Principal(Some(username)));
            next.run(req).await
        }
        Err(e) => crate::core::protocol::respond::<()>(Err(e), false),
    }
}

/// Checks `principal` against `resource`/`action` via the IAM store,
/// returning a uniform `Forbidden`/`Unauthenticated` error otherwise. Every
/// mutating and most read handlers call this before touching state, per
/// spec §6 "every endpoint authorizes via §4.A".
fn require(state: &ServerState, principal: &Principal, resource: &str, action: Action) -> Result<(), NacosError> {
    let Principal(username) = principal;
    let username = username.as_deref().ok_or(NacosError::Unauthenticated)?;
    if state.iam.authorize(username, resource, action) {
        Ok(())
    } else {
        Err(NacosError::Forbidden(format!("'{username}' lacks {action} on '{resource}'")))
    }
}

/// Builds the full admin HTTP router. Login and health are mounted without
/// the auth layer (they are how a client obtains a token, or need no
/// identity at all); everything else runs behind `auth_middleware`.
pub fn router(state: Arc<ServerState>) -> Router {
    let protected = Router::new()
        .merge(iam::router())
        .merge(namespace::router())
        .merge(cluster::console_router())
        .merge(config::router())
        .merge(naming::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(auth::router())
        .merge(health::router())
        .merge(cluster::public_router())
        .merge(protected)
        .with_state(state)
}
