// src/core/notify/mod.rs

//! The Config Notify Bus (spec §4.F): long-poll/push convergence for
//! config listeners, grounded on the same `DashMap`-of-subscribers shape
//! as `core::subscription::SubscriptionBus`, but keyed by fingerprint
//! (namespace, group, dataId, md5) instead of a cluster filter.

use crate::core::configstore::model::{ConfigEntry, ConfigKey};
use crate::core::metrics;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::watch;

/// A single fingerprint as carried by `ConfigBatchListen` / long-poll HTTP:
/// "does the client's copy, at this md5, still match the server's?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub key: ConfigKey,
    pub md5: String,
}

/// Pushed to a listener when its known content diverges from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangeNotify {
    pub namespace: String,
    pub group: String,
    pub data_id: String,
    /// `None` represents the delete sentinel (spec §4.F "not found" content).
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub md5: Option<String>,
}

struct Listener {
    known_md5: String,
    client_ip: Option<String>,
    tx: watch::Sender<ConfigChangeNotify>,
}

#[derive(Default)]
pub struct NotifyBus {
    /// configKey -> (sessionId -> listener)
    listeners: DashMap<ConfigKey, DashMap<u64, Listener>>,
}

impl NotifyBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `listen(sessionId, fingerprints[]) -> changed[]` (spec §4.F).
    /// `lookup` resolves the current entry for a key (gray-aware via
    /// `client_ip`); mismatches are returned immediately, and every listed
    /// key is (re-)registered at its *submitted* md5 regardless of match,
    /// per spec: a stale submission is corrected on the next publish.
    ///
    /// `lookup` resolves the current, already gray-aware md5 for a key
    /// (the caller has already done gray resolution against `client_ip`,
    /// typically via `ConfigStore::get`); `None` means no entry exists.
    pub fn listen(
        &self,
        session_id: u64,
        client_ip: Option<&str>,
        fingerprints: Vec<Fingerprint>,
        lookup: impl Fn(&ConfigKey) -> Option<String>,
    ) -> Vec<Fingerprint> {
        let mut changed = Vec::new();
        for fp in fingerprints {
            let current_md5 = lookup(&fp.key);
            if current_md5.as_deref() != Some(fp.md5.as_str()) {
                changed.push(Fingerprint {
                    key: fp.key.clone(),
                    md5: current_md5.unwrap_or_default(),
                });
            }
            self.register(&fp.key, session_id, fp.md5, client_ip);
        }
        changed
    }

    fn register(&self, key: &ConfigKey, session_id: u64, known_md5: String, client_ip: Option<&str>) {
        let listeners = self.listeners.entry(key.clone()).or_default();
        let is_new = !listeners.contains_key(&session_id);
        let (tx, _rx) = watch::channel(ConfigChangeNotify {
            namespace: key.namespace.clone(),
            group: key.group.clone(),
            data_id: key.data_id.clone(),
            content: None,
            content_type: None,
            md5: Some(known_md5.clone()),
        });
        listeners.insert(
            session_id,
            Listener {
                known_md5,
                client_ip: client_ip.map(str::to_string),
                tx,
            },
        );
        if is_new {
            metrics::ACTIVE_CONFIG_LISTENS.inc();
        }
    }

    /// Returns a fresh receiver for an already-registered (key, session),
    /// used by the RPC push loop to await the next `ConfigChangeNotify`.
    pub fn receiver_for(&self, key: &ConfigKey, session_id: u64) -> Option<watch::Receiver<ConfigChangeNotify>> {
        self.listeners
            .get(key)
            .and_then(|l| l.get(&session_id).map(|s| s.tx.subscribe()))
    }

    /// `unlisten(sessionId, fingerprints[])` (spec §4.F).
    pub fn unlisten(&self, session_id: u64, keys: &[ConfigKey]) {
        for key in keys {
            if let Some(listeners) = self.listeners.get(key) {
                if listeners.remove(&session_id).is_some() {
                    metrics::ACTIVE_CONFIG_LISTENS.dec();
                }
            }
        }
    }

    pub fn unlisten_session_all(&self, session_id: u64) {
        for entry in self.listeners.iter() {
            if entry.value().remove(&session_id).is_some() {
                metrics::ACTIVE_CONFIG_LISTENS.dec();
            }
        }
    }

    /// `onChange(key, entry)` (spec §4.F). `entry = None` is the delete
    /// sentinel. Pushes to every listener whose known md5 differs from the
    /// gray-resolved md5 visible to *that listener's* client IP; does not
    /// update `known_md5` itself — that happens on the listener's next
    /// `listen` call, once it has re-fetched and acknowledged the change.
    pub async fn on_change(&self, key: &ConfigKey, entry: Option<&ConfigEntry>) {
        let Some(listeners) = self.listeners.get(key) else {
            return;
        };
        for l in listeners.iter() {
            let (content, content_type, md5) = match entry {
                Some(e) => {
                    let (content, md5) = e.resolve_for(l.client_ip.as_deref());
                    (Some(content.to_string()), Some(e.content_type.clone()), Some(md5.to_string()))
                }
                None => (None, None, None),
            };
            if md5.as_deref() == Some(l.known_md5.as_str()) {
                continue;
            }
            let notify = ConfigChangeNotify {
                namespace: key.namespace.clone(),
                group: key.group.clone(),
                data_id: key.data_id.clone(),
                content,
                content_type,
                md5,
            };
            if l.tx.send(notify).is_ok() {
                metrics::CONFIG_NOTIFY_PUSHES_TOTAL.inc();
            }
        }
    }

    pub fn listener_count(&self, key: &ConfigKey) -> usize {
        self.listeners.get(key).map_or(0, |l| l.len())
    }

    /// Snapshot of listener counts by key, for introspection endpoints.
    pub fn listener_counts(&self) -> HashMap<ConfigKey, usize> {
        self.listeners.iter().map(|e| (e.key().clone(), e.value().len())).collect()
    }
}
