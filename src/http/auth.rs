// src/http/auth.rs

//! Login (spec §6 "Auth V1/V3"): `/v1/auth/login`, `/v3/auth/user/login`.
//! Both paths share one handler — the real server's v1 and v3 login
//! responses differ only in a couple of legacy field names, which this
//! crate does not carry forward (see DESIGN.md).

use crate::core::errors::NacosError;
use crate::core::protocol::respond;
use crate::core::state::ServerState;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "tokenTtl")]
    pub token_ttl: u64,
    #[serde(rename = "globalAdmin")]
    pub global_admin: bool,
    pub username: String,
}

async fn login(State(state): State<Arc<ServerState>>, body: axum::extract::Form<LoginRequest>) -> axum::response::Response {
    let result: Result<LoginResponse, NacosError> = (|| {
        let token = state.iam.login(&body.username, &body.password)?;
        let global_admin = state.iam.roles_for(&body.username).iter().any(|r| r == crate::core::acl::enforcer::ROOT_ROLE)
            || body.username == "nacos";
        let ttl = {
            let cfg = state.config.try_lock().map(|c| c.auth.token_ttl_seconds).unwrap_or(18_000);
            cfg
        };
        Ok(LoginResponse { access_token: token, token_ttl: ttl, global_admin, username: body.username.clone() })
    })();
    respond(result, false)
}

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/v1/auth/login", post(login))
        .route("/v3/auth/user/login", post(login))
}
