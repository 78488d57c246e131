// src/http/config.rs

//! Config console (spec §6 "Config V2/V3"): `/v2/cs/config`,
//! `/v3/console/cs/config` (+ `/beta`, `/aggr`, `/history*`, `/export`,
//! `/import`). Grounded on `core::configstore::store::ConfigStore`'s
//! already-built operations; this module is pure HTTP plumbing over it.

use super::{Principal, require};
use crate::core::acl::Action;
use crate::core::configstore::{ConfigKey, HistoryRecord, ImportPolicy, ImportReport};
use crate::core::constants::DEFAULT_GROUP;
use crate::core::errors::NacosError;
use crate::core::protocol::respond;
use crate::core::state::ServerState;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

fn resource(key: &ConfigKey) -> String {
    format!("{}:{}:{}", key.namespace, key.group, key.data_id)
}

#[derive(Debug, Deserialize)]
pub struct ConfigKeyParams {
    #[serde(rename = "tenant", alias = "namespaceId", default)]
    pub namespace: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(rename = "dataId")]
    pub data_id: String,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

impl ConfigKeyParams {
    fn key(&self) -> ConfigKey {
        ConfigKey::new(self.namespace.clone(), self.group.clone(), self.data_id.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishParams {
    #[serde(flatten)]
    pub key: ConfigKeyParams,
    pub content: String,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

async fn publish(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<PublishParams>,
) -> Response {
    let key = params.key.key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.config_store.publish(&key, params.content, params.content_type).await
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub content: String,
    pub md5: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

async fn get_config(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Query(params): Query<ConfigKeyParams>,
) -> Response {
    let key = params.key();
    let result: Result<ConfigView, NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Read)?;
        let (content, md5, content_type) = state.config_store.get(&key, Some(&addr.ip().to_string())).await?;
        Ok(ConfigView { content, md5, content_type })
    }
    .await;
    respond(result, false)
}

async fn remove(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ConfigKeyParams>,
) -> Response {
    let key = params.key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.config_store.remove(&key).await
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct PublishBetaParams {
    #[serde(flatten)]
    pub key: ConfigKeyParams,
    pub content: String,
    #[serde(rename = "betaIps")]
    pub beta_ips: String,
}

async fn publish_beta(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<PublishBetaParams>,
) -> Response {
    let key = params.key.key();
    let ip_list = params.beta_ips.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.config_store.publish_beta(&key, params.content, ip_list).await
    }
    .await;
    respond(result, false)
}

async fn get_beta(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ConfigKeyParams>,
) -> Response {
    let key = params.key();
    let result: Result<crate::core::configstore::model::GrayEntry, NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Read)?;
        state.config_store.query_beta(&key).await
    }
    .await;
    respond(result, false)
}

async fn remove_beta(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ConfigKeyParams>,
) -> Response {
    let key = params.key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.config_store.remove_beta(&key).await
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    #[serde(flatten)]
    pub key: ConfigKeyParams,
    #[serde(rename = "datumId")]
    pub datum_id: String,
    pub content: Option<String>,
}

async fn publish_aggregate(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<AggregateParams>,
) -> Response {
    let key = params.key.key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        let content = params.content.ok_or_else(|| NacosError::InvalidArgument("content required".into()))?;
        state.config_store.publish_aggregate(&key, params.datum_id, content).await
    }
    .await;
    respond(result, false)
}

async fn remove_aggregate(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<AggregateParams>,
) -> Response {
    let key = params.key.key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.config_store.remove_aggregate(&key, &params.datum_id).await
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct HistoryListParams {
    #[serde(flatten)]
    pub key: ConfigKeyParams,
    #[serde(default = "default_page_no")]
    pub page_no: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_no() -> usize {
    1
}

fn default_page_size() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    #[serde(rename = "pageItems")]
    pub page_items: Vec<HistoryRecord>,
    #[serde(rename = "totalCount")]
    pub total_count: usize,
}

async fn list_history(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<HistoryListParams>,
) -> Response {
    let key = params.key.key();
    let result: Result<HistoryPage, NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Read)?;
        let (page_items, total_count) = state.config_store.list_history(&key, params.page_no, params.page_size).await;
        Ok(HistoryPage { page_items, total_count })
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct HistoryGetParams {
    #[serde(flatten)]
    pub key: ConfigKeyParams,
    pub nid: u64,
}

async fn get_history(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<HistoryGetParams>,
) -> Response {
    let key = params.key.key();
    let result: Result<HistoryRecord, NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Read)?;
        state.config_store.get_history(&key, params.nid).await
    }
    .await;
    respond(result, false)
}

async fn previous_history(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<HistoryGetParams>,
) -> Response {
    let key = params.key.key();
    let result: Result<HistoryRecord, NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Read)?;
        state.config_store.previous_history(&key, params.nid).await
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(rename = "tenant", alias = "namespaceId", default)]
    pub namespace: String,
    pub group: Option<String>,
}

/// `GET .../export`: a zip of `{group}/{dataId}.{ext}` entries, grounded on
/// the `zip` crate the way the teacher's own cache-manifest writer uses it
/// for on-disk archives.
async fn export(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ExportParams>,
) -> Response {
    let resource = format!("{}:{}:*", params.namespace, params.group.as_deref().unwrap_or("*"));
    if let Err(e) = require(&state, &principal, &resource, Action::Read) {
        return respond::<()>(Err(e), false);
    }
    let entries = state.config_store.export_entries(&params.namespace, params.group.as_deref()).await;
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        for (key, entry) in &entries {
            let name = format!("{}/{}", key.group, key.data_id);
            if zip.start_file(name, options).is_err() {
                return respond::<()>(Err(NacosError::Internal("failed to build export archive".into())), false);
            }
            if zip.write_all(entry.content.as_bytes()).is_err() {
                return respond::<()>(Err(NacosError::Internal("failed to build export archive".into())), false);
            }
        }
        if zip.finish().is_err() {
            return respond::<()>(Err(NacosError::Internal("failed to finalize export archive".into())), false);
        }
    }
    (
        [("content-type", "application/zip"), ("content-disposition", "attachment; filename=\"config-export.zip\"")],
        buf.into_inner(),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    #[serde(rename = "tenant", alias = "namespaceId", default)]
    pub namespace: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_policy")]
    pub policy: String,
}

fn default_policy() -> String {
    "SKIP".to_string()
}

/// `POST .../import`: accepts a raw zip body built by `export`, same shape
/// as `publish`'s `(namespace, group, dataId, content)` triples.
async fn import(Query(params): Query<ImportParams>, State(state): State<Arc<ServerState>>, Extension(principal): Extension<Principal>, body: Bytes) -> Response {
    let resource = format!("{}:{}:*", params.namespace, params.group.as_deref().unwrap_or("*"));
    if let Err(e) = require(&state, &principal, &resource, Action::Write) {
        return respond::<()>(Err(e), false);
    }
    let policy = match params.policy.as_str() {
        "OVERWRITE" => ImportPolicy::Overwrite,
        "ABORT" => ImportPolicy::Abort,
        _ => ImportPolicy::Skip,
    };
    let mut archive = match zip::ZipArchive::new(Cursor::new(body.as_ref())) {
        Ok(a) => a,
        Err(e) => return respond::<()>(Err(NacosError::InvalidArgument(format!("not a valid zip: {e}"))), false),
    };
    let mut decoded = Vec::new();
    for i in 0..archive.len() {
        let mut file = match archive.by_index(i) {
            Ok(f) => f,
            Err(_) => continue,
        };
        let Some((group, data_id)) = file.name().split_once('/') else {
            continue;
        };
        let mut content = String::new();
        if file.read_to_string(&mut content).is_err() {
            continue;
        }
        decoded.push((ConfigKey::new(params.namespace.clone(), group.to_string(), data_id.to_string()), content, None));
    }
    let report: ImportReport = state.config_store.import_entries(decoded, policy).await;
    respond(Ok::<_, NacosError>(report), false)
}

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/v2/cs/config", get(get_config).post(publish).delete(remove))
        .route("/v3/console/cs/config", get(get_config).post(publish).delete(remove))
        .route("/v2/cs/config/beta", get(get_beta).post(publish_beta).delete(remove_beta))
        .route("/v3/console/cs/config/beta", get(get_beta).post(publish_beta).delete(remove_beta))
        .route("/v2/cs/config/aggr", post(publish_aggregate).delete(remove_aggregate))
        .route("/v3/console/cs/config/aggr", post(publish_aggregate).delete(remove_aggregate))
        .route("/v3/console/cs/config/history/list", get(list_history))
        .route("/v3/console/cs/config/history", get(get_history))
        .route("/v3/console/cs/config/history/previous", get(previous_history))
        .route("/v3/console/cs/config/export", get(export))
        .route("/v3/console/cs/config/import", post(import))
}
