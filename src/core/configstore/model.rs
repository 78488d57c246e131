// src/core/configstore/model.rs

//! Data model for the Config Store (spec §3/§4.E).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a config entry: (namespace, group, dataId).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    pub namespace: String,
    pub group: String,
    pub data_id: String,
}

impl ConfigKey {
    pub fn new(namespace: impl Into<String>, group: impl Into<String>, data_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            group: group.into(),
            data_id: data_id.into(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}+{}", self.data_id, self.group, self.namespace)
    }
}

/// The gray (beta) shadow of a config entry: visible only to clients whose
/// source IP is in `ip_list` (spec §4.E `publishBeta`/`get` gray resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrayEntry {
    pub content: String,
    pub md5: String,
    pub ip_list: Vec<String>,
}

/// One datum contributed to an aggregated config (spec §4.E `publishAggregate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateDatum {
    pub datum_id: String,
    pub content: String,
}

/// A stored config entry: base content plus an optional gray shadow and
/// the datums composing it, if it is an aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub content: String,
    pub content_type: String,
    pub md5: String,
    pub last_modified: u64,
    pub encrypted_data_key: Option<String>,
    pub gray: Option<GrayEntry>,
    /// Present iff this entry is composed from `publishAggregate` datums,
    /// keyed by `datumId`. Absent for a plain `publish`.
    pub datums: Option<Vec<AggregateDatum>>,
}

impl ConfigEntry {
    /// Gray resolution (spec §4.E `get`): gray content wins iff a gray
    /// entry exists and `client_ip` is in its IP allowlist.
    pub fn resolve_for(&self, client_ip: Option<&str>) -> (&str, &str) {
        if let (Some(gray), Some(ip)) = (&self.gray, client_ip) {
            if gray.ip_list.iter().any(|allowed| allowed == ip) {
                return (gray.content.as_str(), gray.md5.as_str());
            }
        }
        (self.content.as_str(), self.md5.as_str())
    }
}

/// The kind of mutation a history record captures, per spec §4.E.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryOp {
    Insert,
    Update,
    Delete,
    AggregateMerge,
}

impl HistoryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryOp::Insert => "I",
            HistoryOp::Update => "U",
            HistoryOp::Delete => "D",
            HistoryOp::AggregateMerge => "A",
        }
    }
}

/// One immutable history record for a config key (spec §4.E `listHistory`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub nid: u64,
    pub op: HistoryOp,
    pub content: String,
    pub md5: String,
    pub content_type: String,
    pub modified_at: u64,
}

/// The conflict policy for `importZip` (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportPolicy {
    Overwrite,
    Skip,
    Abort,
}

/// Per-entry outcome and a summary, returned by `importZip`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub succeeded: Vec<ConfigKey>,
    pub skipped: Vec<ConfigKey>,
    pub failed: Vec<(ConfigKey, String)>,
    pub aborted: bool,
}
