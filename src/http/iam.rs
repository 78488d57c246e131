// src/http/iam.rs

//! Users/Roles/Permissions (spec §6 "Users/Roles/Perms V3"):
//! `/v3/auth/user`, `/v3/auth/role`, `/v3/auth/permission`, each with a
//! `/search`/`/searchPage` variant. All three resources live behind
//! `ROLE_ADMIN`-only mutation, mirroring the real server's restriction
//! that only admins manage IAM itself.

use super::{Principal, require};
use crate::core::acl::{Action, enforcer::ROOT_ROLE};
use crate::core::errors::NacosError;
use crate::core::protocol::respond;
use crate::core::state::ServerState;
use axum::Router;
use axum::extract::{Extension, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const IAM_RESOURCE: &str = "*:*:iam";

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub username: String,
    pub roles: Vec<String>,
}

async fn create_user(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<UserParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Write)?;
        let password = params.password.ok_or_else(|| NacosError::InvalidArgument("password required".into()))?;
        state.iam.create_user(&params.username, &password)
    })();
    respond(result, false)
}

async fn delete_user(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<UserParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Write)?;
        state.iam.delete_user(&params.username)
    })();
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_page")]
    pub page_no: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    100
}

async fn list_users(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<SearchParams>,
) -> axum::response::Response {
    let result: Result<Vec<UserView>, NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Read)?;
        let mut users = state.iam.list_users();
        if let Some(filter) = &params.username {
            users.retain(|u| u.contains(filter.as_str()));
        }
        users.sort();
        let start = (params.page_no.max(1) - 1) * params.page_size;
        Ok(users
            .into_iter()
            .skip(start)
            .take(params.page_size)
            .map(|username| {
                let roles = state.iam.roles_for(&username);
                UserView { username, roles }
            })
            .collect())
    })();
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct RoleParams {
    pub role: String,
    pub username: String,
}

async fn bind_role(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<RoleParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Write)?;
        state.iam.bind_role(&params.username, &params.role)
    })();
    respond(result, false)
}

async fn unbind_role(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<RoleParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Write)?;
        state.iam.unbind_role(&params.username, &params.role);
        Ok(())
    })();
    respond(result, false)
}

async fn list_roles(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    let result: Result<Vec<crate::core::acl::RoleBinding>, NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Read)?;
        Ok(state.iam.list_role_bindings())
    })();
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct PermissionParams {
    pub role: String,
    #[serde(rename = "resource")]
    pub resource_pattern: String,
    pub action: String,
}

async fn grant_permission(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<PermissionParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Write)?;
        let action = Action::parse(&params.action)
            .ok_or_else(|| NacosError::InvalidArgument(format!("invalid action '{}'", params.action)))?;
        state.iam.grant(&params.role, &params.resource_pattern, action);
        Ok(())
    })();
    respond(result, false)
}

async fn revoke_permission(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<PermissionParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Write)?;
        state.iam.revoke(&params.role, &params.resource_pattern);
        Ok(())
    })();
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: String,
}

async fn list_permissions(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<RoleQuery>,
) -> axum::response::Response {
    let result: Result<Vec<crate::core::acl::Permission>, NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Read)?;
        Ok(state.iam.list_permissions(&params.role))
    })();
    respond(result, false)
}

/// Deleting a role cascades to its permissions/bindings (spec §4.A) and
/// requires the same `ROLE_ADMIN`-only gate as every other IAM mutation.
async fn delete_role(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<RoleQuery>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, IAM_RESOURCE, Action::Write)?;
        if params.role == ROOT_ROLE {
            return Err(NacosError::Forbidden(format!("'{ROOT_ROLE}' cannot be deleted")));
        }
        state.iam.delete_role(&params.role);
        Ok(())
    })();
    respond(result, false)
}

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/v3/auth/user", post(create_user).delete(delete_user))
        .route("/v3/auth/user/search", get(list_users))
        .route("/v3/auth/role", post(bind_role).delete(unbind_role))
        .route("/v3/auth/role/search", get(list_roles))
        .route("/v3/auth/role/searchPage", get(list_roles))
        .route("/v3/auth/permission", post(grant_permission).delete(revoke_permission))
        .route("/v3/auth/permission/search", get(list_permissions))
        .route("/v3/auth/permission/searchPage", get(list_permissions))
        .route("/v3/auth/role/delete", post(delete_role))
}
