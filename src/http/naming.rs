// src/http/naming.rs

//! Naming console (spec §6 "Naming V2"): `/v2/ns/instance`, `/v2/ns/service`,
//! `/v2/ns/operator/{switches,metrics}`, `/v2/ns/client/*`,
//! `/v2/ns/health/instance`. HTTP-side registration is the same
//! non-ephemeral path the RPC `InstanceRegister` handler uses, just without
//! an owning session (spec §4.C: only ephemeral instances require one).

use super::{Principal, require};
use crate::core::acl::Action;
use crate::core::constants::DEFAULT_GROUP;
use crate::core::errors::NacosError;
use crate::core::metrics;
use crate::core::protocol::respond;
use crate::core::registry::{Instance, InstanceKey, ServiceInfo, ServiceKey};
use crate::core::state::ServerState;
use axum::Router;
use axum::extract::{Extension, Query, State};
use axum::response::Response;
use axum::routing::{get, put};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

fn resource(key: &ServiceKey) -> String {
    format!("{}:{}:{}", key.namespace, key.group, key.name)
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_cluster() -> String {
    crate::core::constants::DEFAULT_CLUSTER_NAME.to_string()
}

#[derive(Debug, Deserialize)]
pub struct InstanceParams {
    #[serde(rename = "tenant", alias = "namespaceId", default)]
    pub namespace: String,
    #[serde(rename = "groupName", default = "default_group")]
    pub group: String,
    #[serde(rename = "serviceName")]
    pub service_name: String,
    pub ip: String,
    pub port: u16,
    #[serde(rename = "clusterName", default = "default_cluster")]
    pub cluster: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub healthy: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub ephemeral: bool,
    pub metadata: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl InstanceParams {
    fn service_key(&self) -> ServiceKey {
        ServiceKey::new(self.namespace.clone(), self.group.clone(), self.service_name.clone())
    }

    fn instance(&self) -> Instance {
        let metadata: HashMap<String, String> = self
            .metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
            .unwrap_or_default();
        Instance {
            ip: self.ip.clone(),
            port: self.port,
            cluster: self.cluster.clone(),
            weight: self.weight,
            healthy: self.healthy,
            enabled: self.enabled,
            ephemeral: self.ephemeral,
            metadata,
            instance_id: None,
            owner_session_id: None,
        }
    }

    fn instance_key(&self) -> InstanceKey {
        InstanceKey { ip: self.ip.clone(), port: self.port, cluster: self.cluster.clone() }
    }
}

async fn register_instance(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<InstanceParams>,
) -> Response {
    let key = params.service_key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        // HTTP registration never owns a session; a non-ephemeral instance
        // needs none, and an ephemeral one registered over HTTP has no
        // heartbeat owner to expire it, matching the real console's
        // "prefer RPC for ephemeral" guidance.
        state.registry.register(&key, params.instance(), None).await
    }
    .await;
    respond(result, false)
}

async fn deregister_instance(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<InstanceParams>,
) -> Response {
    let key = params.service_key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.registry.deregister(&key, &params.instance_key()).await
    }
    .await;
    respond(result, false)
}

async fn update_instance(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<InstanceParams>,
) -> Response {
    let key = params.service_key();
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.registry.update_instance(&key, params.instance()).await
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct QueryInstanceParams {
    #[serde(rename = "tenant", alias = "namespaceId", default)]
    pub namespace: String,
    #[serde(rename = "groupName", default = "default_group")]
    pub group: String,
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "clusters", default)]
    pub clusters: String,
    #[serde(rename = "healthyOnly", default)]
    pub healthy_only: bool,
}

async fn query_instances(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<QueryInstanceParams>,
) -> Response {
    let key = ServiceKey::new(params.namespace, params.group, params.service_name);
    let clusters: Vec<String> = params.clusters.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
    let result: Result<ServiceInfo, NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Read)?;
        Ok(state.registry.query(&key, &clusters, params.healthy_only).await)
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct HealthParams {
    #[serde(rename = "tenant", alias = "namespaceId", default)]
    pub namespace: String,
    #[serde(rename = "groupName", default = "default_group")]
    pub group: String,
    #[serde(rename = "serviceName")]
    pub service_name: String,
    pub ip: String,
    pub port: u16,
    #[serde(rename = "clusterName", default = "default_cluster")]
    pub cluster: String,
    pub healthy: bool,
}

async fn update_health(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    axum::extract::Form(params): axum::extract::Form<HealthParams>,
) -> Response {
    let key = ServiceKey::new(params.namespace, params.group, params.service_name);
    let ikey = InstanceKey { ip: params.ip, port: params.port, cluster: params.cluster };
    let result: Result<(), NacosError> = async {
        require(&state, &principal, &resource(&key), Action::Write)?;
        state.registry.update_health(&key, &ikey, params.healthy).await
    }
    .await;
    respond(result, false)
}

#[derive(Debug, Deserialize)]
pub struct ServiceListParams {
    #[serde(rename = "tenant", alias = "namespaceId", default)]
    pub namespace: String,
    #[serde(rename = "groupName", default = "default_group")]
    pub group: String,
    #[serde(rename = "serviceNameParam", default)]
    pub prefix: Option<String>,
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

#[derive(Debug, Serialize)]
pub struct ServiceListView {
    pub count: usize,
    pub doms: Vec<String>,
}

async fn list_services(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ServiceListParams>,
) -> Response {
    let gate = format!("{}:{}:*", params.namespace, params.group);
    let result: Result<ServiceListView, NacosError> = (|| {
        require(&state, &principal, &gate, Action::Read)?;
        let (doms, count) = state.registry.list_services(&params.namespace, &params.group, params.prefix.as_deref(), params.page_no, params.page_size);
        Ok(ServiceListView { count, doms })
    })();
    respond(result, false)
}

#[derive(Debug, Serialize)]
pub struct OperatorSwitches {
    #[serde(rename = "healthCheckEnabled")]
    pub health_check_enabled: bool,
    #[serde(rename = "distroEnabled")]
    pub distro_enabled: bool,
}

async fn operator_switches() -> Response {
    respond(
        Ok::<_, NacosError>(OperatorSwitches { health_check_enabled: true, distro_enabled: false }),
        false,
    )
}

#[derive(Debug, Serialize)]
pub struct OperatorMetrics {
    #[serde(rename = "serviceCount")]
    pub service_count: usize,
    #[serde(rename = "instanceCount")]
    pub instance_count: usize,
    #[serde(rename = "subscribeCount")]
    pub subscribe_count: usize,
    #[serde(rename = "connectionBasedClientCount")]
    pub connection_based_client_count: usize,
}

async fn operator_metrics(State(state): State<Arc<ServerState>>) -> Response {
    let metrics = OperatorMetrics {
        service_count: state.registry.service_count(),
        instance_count: state.registry.instance_count_total().await,
        subscribe_count: metrics::ACTIVE_SUBSCRIPTIONS.get() as usize,
        connection_based_client_count: state.sessions.connected_count(),
    };
    respond(Ok::<_, NacosError>(metrics), false)
}

#[derive(Debug, Serialize)]
pub struct ClientView {
    #[serde(rename = "connectionCount")]
    pub connection_count: usize,
}

async fn list_clients(State(state): State<Arc<ServerState>>) -> Response {
    respond(Ok::<_, NacosError>(ClientView { connection_count: state.sessions.connected_count() }), false)
}

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route(
            "/v2/ns/instance",
            get(query_instances).post(register_instance).put(update_instance).delete(deregister_instance),
        )
        .route("/v2/ns/service", get(list_services))
        .route("/v2/ns/health/instance", put(update_health))
        .route("/v2/ns/operator/switches", get(operator_switches))
        .route("/v2/ns/operator/metrics", get(operator_metrics))
        .route("/v2/ns/client/list", get(list_clients))
}
