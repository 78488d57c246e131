// src/http/namespace.rs

//! Namespace management (spec §3 "Namespace", §6 "Namespace V2"):
//! `/v2/console/namespace` (+ `/list`).

use super::{Principal, require};
use crate::core::acl::Action;
use crate::core::errors::NacosError;
use crate::core::namespace::Namespace;
use crate::core::protocol::respond;
use crate::core::state::ServerState;
use axum::Router;
use axum::extract::{Extension, Query, State};
use axum::routing::get;
use serde::Deserialize;
use std::sync::Arc;

const RESOURCE: &str = "*:*:namespace";

#[derive(Debug, Deserialize)]
pub struct NamespaceParams {
    #[serde(rename = "namespaceId")]
    pub namespace_id: String,
    #[serde(rename = "namespaceName", default)]
    pub namespace_name: String,
    #[serde(rename = "namespaceDesc", default)]
    pub namespace_desc: String,
}

async fn create(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<NamespaceParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, RESOURCE, Action::Write)?;
        state.namespaces.create(params.namespace_id, params.namespace_name, params.namespace_desc)
    })();
    respond(result, false)
}

async fn update(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<NamespaceParams>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = (|| {
        require(&state, &principal, RESOURCE, Action::Write)?;
        state.namespaces.update(&params.namespace_id, params.namespace_name, params.namespace_desc)
    })();
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct NamespaceIdQuery {
    #[serde(rename = "namespaceId")]
    pub namespace_id: String,
}

async fn remove(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<NamespaceIdQuery>,
) -> axum::response::Response {
    let result: Result<(), NacosError> = async {
        require(&state, &principal, RESOURCE, Action::Write)?;
        let has_configs = !state.config_store.export_entries(&params.namespace_id, None).await.is_empty();
        state.namespaces.delete(&params.namespace_id, &state.registry, has_configs)
    }
    .await;
    respond(result, false)
}

async fn get_one(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<NamespaceIdQuery>,
) -> axum::response::Response {
    let result: Result<Namespace, NacosError> = (|| {
        require(&state, &principal, RESOURCE, Action::Read)?;
        state
            .namespaces
            .get(&params.namespace_id)
            .ok_or_else(|| NacosError::NotFound(format!("namespace '{}' not found", params.namespace_id)))
    })();
    respond(result, false)
}

async fn list(State(state): State<Arc<ServerState>>, Extension(principal): Extension<Principal>) -> axum::response::Response {
    let result: Result<Vec<Namespace>, NacosError> = (|| {
        require(&state, &principal, RESOURCE, Action::Read)?;
        Ok(state.namespaces.list())
    })();
    respond(result, false)
}

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route(
            "/v2/console/namespace",
            get(get_one).post(create).put(update).delete(remove),
        )
        .route("/v2/console/namespace/list", get(list))
}
