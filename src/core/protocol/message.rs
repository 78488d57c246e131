// src/core/protocol/message.rs

//! Wire message types for the bidirectional RPC surface (spec §6): the
//! request kinds the core must handle, the responses it returns, and the
//! kinds it pushes unprompted.

use crate::core::notify::ConfigChangeNotify;
use crate::core::registry::ServiceInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDto {
    pub ip: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub healthy: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub ephemeral: bool,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_weight() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintDto {
    pub namespace: String,
    pub group: String,
    pub data_id: String,
    pub md5: String,
}

/// Request kinds the core must handle (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpcRequest {
    ConnectionSetup {
        client_version: Option<String>,
        #[serde(default)]
        labels: HashMap<String, String>,
        username: Option<String>,
        password: Option<String>,
    },
    Ping,
    InstanceRegister {
        namespace: String,
        group: String,
        service_name: String,
        instance: InstanceDto,
    },
    InstanceDeregister {
        namespace: String,
        group: String,
        service_name: String,
        ip: String,
        port: u16,
        cluster_name: String,
    },
    BatchInstanceRegister {
        namespace: String,
        group: String,
        service_name: String,
        instances: Vec<InstanceDto>,
    },
    ServiceQuery {
        namespace: String,
        group: String,
        service_name: String,
        #[serde(default)]
        clusters: Vec<String>,
        #[serde(default)]
        healthy_only: bool,
    },
    ServiceListQuery {
        namespace: String,
        group: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_page")]
        page_no: usize,
        #[serde(default = "default_page_size")]
        page_size: usize,
    },
    SubscribeService {
        namespace: String,
        group: String,
        service_name: String,
        #[serde(default)]
        clusters: Vec<String>,
    },
    UnsubscribeService {
        namespace: String,
        group: String,
        service_name: String,
    },
    ConfigPublish {
        namespace: String,
        group: String,
        data_id: String,
        content: String,
        content_type: Option<String>,
    },
    ConfigQuery {
        namespace: String,
        group: String,
        data_id: String,
    },
    ConfigRemove {
        namespace: String,
        group: String,
        data_id: String,
    },
    ConfigBatchListen {
        listen: bool,
        fingerprints: Vec<FingerprintDto>,
    },
}

fn default_page() -> usize {
    1
}
fn default_page_size() -> usize {
    20
}

/// Responses the core returns for a handled `RpcRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpcResponse {
    ConnectionAck,
    Pong,
    Ack,
    ServiceInfo(ServiceInfo),
    ServiceList { services: Vec<String>, count: usize },
    ConfigContent { content: String, md5: String, content_type: String },
    ConfigChanged { changed: Vec<FingerprintDto> },
    Error { error_code: i32, message: String },
}

/// Kinds the core pushes without a matching request (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerPush {
    ConnectResetRequest { reason: String },
    ClientDetectionRequest,
    NotifySubscriber(ServiceInfo),
    ConfigChangeNotify(ConfigChangeNotify),
}

/// A request envelope: `request_id` lets the client match the response
/// when replies can arrive out of order relative to the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub request_id: u64,
    pub request: RpcRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub request_id: u64,
    pub response: RpcResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFrame {
    pub push_id: u64,
    pub push: ServerPush,
}
