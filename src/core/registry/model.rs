// src/core/registry/model.rs

//! Data model for the Service Registry (spec §3/§4.C).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies a service: (namespace, group, name). `group` defaults to
/// `DEFAULT_GROUP` at the edges (HTTP/RPC handlers), not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceKey {
    pub namespace: String,
    pub group: String,
    pub name: String,
}

impl ServiceKey {
    pub fn new(namespace: impl Into<String>, group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@@{}@@{}", self.namespace, self.group, self.name)
    }
}

/// An instance's identity within a service: (ip, port, cluster).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub ip: String,
    pub port: u16,
    pub cluster: String,
}

/// A registered service instance. Structural equality (all fields but
/// `instance_id`, which is server-assigned) drives the registry's no-op
/// detection for invariant 1 ("Registry idempotence").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub ip: String,
    pub port: u16,
    pub cluster: String,
    pub weight: f64,
    pub healthy: bool,
    pub enabled: bool,
    pub ephemeral: bool,
    pub metadata: HashMap<String, String>,
    pub instance_id: Option<String>,
    /// The session that owns this instance's lifetime, set iff `ephemeral`.
    #[serde(skip)]
    pub owner_session_id: Option<u64>,
}

impl Instance {
    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            ip: self.ip.clone(),
            port: self.port,
            cluster: self.cluster.clone(),
        }
    }

    /// Structural equality ignoring `owner_session_id` and `instance_id`,
    /// used to decide whether a re-register is a true no-op (spec §4.C).
    pub fn same_state(&self, other: &Instance) -> bool {
        self.ip == other.ip
            && self.port == other.port
            && self.cluster == other.cluster
            && self.weight == other.weight
            && self.healthy == other.healthy
            && self.enabled == other.enabled
            && self.ephemeral == other.ephemeral
            && self.metadata == other.metadata
    }
}

/// Health-check policy metadata attached to a cluster (spec §3: "holds
/// health-check policy metadata"). No prober runs against it — the active
/// probe is an external collaborator — but `updateHealth` bookkeeping and
/// introspection endpoints consult it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthCheckPolicy {
    None,
    Probe { interval_ms: u64, timeout_ms: u64 },
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self::None
    }
}

/// A named group of instances within a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub health_check: HealthCheckPolicy,
    pub instances: HashMap<InstanceKey, Instance>,
}

/// A service: one per (namespace, group, name), holding a map of
/// cluster-name -> Cluster plus the set of subscribed sessions is tracked
/// separately by the Subscription Bus.
#[derive(Debug, Clone, Default)]
pub struct Service {
    pub clusters: HashMap<String, Cluster>,
    /// Monotonic revision, bumped on every mutation; carried on pushed
    /// `ServiceInfo` snapshots so clients can dedup (spec §4.D).
    pub revision: u64,
}

impl Service {
    pub fn instance_count(&self) -> usize {
        self.clusters.values().map(|c| c.instances.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.instance_count() == 0
    }
}

/// The push-wire snapshot unit (spec §3 "ServiceInfo").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub namespace: String,
    pub group: String,
    pub name: String,
    pub clusters: Vec<String>,
    pub hosts: Vec<Instance>,
    pub cache_millis: u64,
    pub checksum: String,
    pub last_ref_time: u64,
}
