// src/core/configstore/store.rs

//! The Config Store (spec §4.E): in-memory index over
//! (namespace, group, dataId), serialized per-key, with history and the
//! gray/aggregate variants. Same per-key `Arc<Mutex<_>>`-behind-`DashMap`
//! shape as `core::registry::store::Registry`, since spec §5 asks for the
//! identical "per-key serialization, cross-key parallelism" discipline.

use super::model::{
    AggregateDatum, ConfigEntry, ConfigKey, GrayEntry, HistoryOp, HistoryRecord, ImportPolicy, ImportReport,
};
use crate::core::errors::NacosError;
use crate::core::metrics;
use crate::core::notify::NotifyBus;
use dashmap::DashMap;
use md5::{Digest, Md5};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

pub struct ConfigStore {
    entries: DashMap<ConfigKey, Arc<Mutex<ConfigSlot>>>,
    notify_bus: Arc<NotifyBus>,
    max_content_bytes: usize,
    max_history_per_key: usize,
}

#[derive(Default)]
struct ConfigSlot {
    entry: Option<ConfigEntry>,
    history: Vec<HistoryRecord>,
    next_nid: u64,
}

impl ConfigStore {
    pub fn new(notify_bus: Arc<NotifyBus>, max_content_bytes: usize, max_history_per_key: usize) -> Self {
        Self {
            entries: DashMap::new(),
            notify_bus,
            max_content_bytes,
            max_history_per_key,
        }
    }

    fn slot_for(&self, key: &ConfigKey) -> Arc<Mutex<ConfigSlot>> {
        self.entries.entry(key.clone()).or_default().clone()
    }

    /// `publish(namespace, group, dataId, content, type?)` (spec §4.E).
    pub async fn publish(
        &self,
        key: &ConfigKey,
        content: String,
        content_type: Option<String>,
    ) -> Result<(), NacosError> {
        if content.len() > self.max_content_bytes {
            return Err(NacosError::ResourceExhausted(format!(
                "content exceeds max size of {} bytes",
                self.max_content_bytes
            )));
        }
        let slot = self.slot_for(key);
        let mut guard = slot.lock().await;
        let op = if guard.entry.is_some() { HistoryOp::Update } else { HistoryOp::Insert };
        let content_type = content_type
            .or_else(|| guard.entry.as_ref().map(|e| e.content_type.clone()))
            .unwrap_or_else(|| "text".to_string());
        let md5 = md5_hex(&content);

        let entry = ConfigEntry {
            content,
            content_type,
            md5,
            last_modified: now_millis(),
            encrypted_data_key: guard.entry.as_ref().and_then(|e| e.encrypted_data_key.clone()),
            gray: guard.entry.take().and_then(|e| e.gray),
            datums: None,
        };
        Self::record_history(&mut guard, op, &entry, self.max_history_per_key);
        if op == HistoryOp::Insert {
            metrics::CONFIG_ENTRIES.inc();
        }
        metrics::CONFIG_PUBLISHES_TOTAL.with_label_values(&["normal"]).inc();
        let snapshot = entry.clone();
        guard.entry = Some(entry);
        drop(guard);

        self.notify_bus.on_change(key, Some(&snapshot)).await;
        Ok(())
    }

    /// `get(namespace, group, dataId, clientIp)` (spec §4.E). Gray-aware.
    pub async fn get(&self, key: &ConfigKey, client_ip: Option<&str>) -> Result<(String, String, String), NacosError> {
        let Some(slot) = self.entries.get(key).map(|e| e.clone()) else {
            return Err(NacosError::NotFound(format!("config '{key}' not found")));
        };
        let guard = slot.lock().await;
        let entry = guard.entry.as_ref().ok_or_else(|| NacosError::NotFound(format!("config '{key}' not found")))?;
        let (content, md5) = entry.resolve_for(client_ip);
        Ok((content.to_string(), md5.to_string(), entry.content_type.clone()))
    }

    /// `remove(namespace, group, dataId)` (spec §4.E).
    pub async fn remove(&self, key: &ConfigKey) -> Result<(), NacosError> {
        let Some(slot) = self.entries.get(key).map(|e| e.clone()) else {
            return Ok(());
        };
        let mut guard = slot.lock().await;
        let Some(entry) = guard.entry.take() else {
            return Ok(());
        };
        let history_entry = entry.clone();
        Self::record_history(&mut guard, HistoryOp::Delete, &history_entry, self.max_history_per_key);
        metrics::CONFIG_ENTRIES.dec();
        drop(guard);

        self.notify_bus.on_change(key, None).await;
        Ok(())
    }

    /// `publishBeta(namespace, group, dataId, content, ipList)` (spec §4.E).
    pub async fn publish_beta(&self, key: &ConfigKey, content: String, ip_list: Vec<String>) -> Result<(), NacosError> {
        let slot = self.slot_for(key);
        let mut guard = slot.lock().await;
        let entry = guard
            .entry
            .as_mut()
            .ok_or_else(|| NacosError::NotFound(format!("config '{key}' has no base entry to shadow")))?;
        entry.gray = Some(GrayEntry { md5: md5_hex(&content), content, ip_list });
        let snapshot = entry.clone();
        drop(guard);
        self.notify_bus.on_change(key, Some(&snapshot)).await;
        Ok(())
    }

    /// `queryBeta(namespace, group, dataId)` (spec §4.E).
    pub async fn query_beta(&self, key: &ConfigKey) -> Result<GrayEntry, NacosError> {
        let slot = self
            .entries
            .get(key)
            .map(|e| e.clone())
            .ok_or_else(|| NacosError::NotFound(format!("config '{key}' not found")))?;
        let guard = slot.lock().await;
        guard
            .entry
            .as_ref()
            .and_then(|e| e.gray.clone())
            .ok_or_else(|| NacosError::NotFound("no gray entry".into()))
    }

    /// `removeBeta(namespace, group, dataId)` (spec §4.E).
    pub async fn remove_beta(&self, key: &ConfigKey) -> Result<(), NacosError> {
        let Some(slot) = self.entries.get(key).map(|e| e.clone()) else {
            return Ok(());
        };
        let mut guard = slot.lock().await;
        let Some(entry) = guard.entry.as_mut() else {
            return Ok(());
        };
        entry.gray = None;
        let snapshot = entry.clone();
        drop(guard);
        self.notify_bus.on_change(key, Some(&snapshot)).await;
        Ok(())
    }

    /// `publishAggregate(key, datumId, content)` (spec §4.E): upserts a
    /// datum and re-merges, publishing the composed entry.
    pub async fn publish_aggregate(&self, key: &ConfigKey, datum_id: String, content: String) -> Result<(), NacosError> {
        let slot = self.slot_for(key);
        let mut guard = slot.lock().await;
        let mut datums = guard
            .entry
            .take()
            .and_then(|e| e.datums)
            .unwrap_or_default();
        if let Some(d) = datums.iter_mut().find(|d| d.datum_id == datum_id) {
            d.content = content;
        } else {
            datums.push(AggregateDatum { datum_id, content });
        }
        datums.sort_by(|a, b| a.datum_id.cmp(&b.datum_id));
        self.merge_aggregate_locked(&mut guard, datums)?;
        let snapshot = guard.entry.clone().expect("just merged");
        drop(guard);
        self.notify_bus.on_change(key, Some(&snapshot)).await;
        Ok(())
    }

    /// `removeAggregate(key, datumId)` (spec §4.E).
    pub async fn remove_aggregate(&self, key: &ConfigKey, datum_id: &str) -> Result<(), NacosError> {
        let slot = self.slot_for(key);
        let mut guard = slot.lock().await;
        let mut datums = guard
            .entry
            .take()
            .and_then(|e| e.datums)
            .unwrap_or_default();
        datums.retain(|d| d.datum_id != datum_id);
        self.merge_aggregate_locked(&mut guard, datums)?;
        let snapshot = guard.entry.clone().expect("just merged");
        drop(guard);
        self.notify_bus.on_change(key, Some(&snapshot)).await;
        Ok(())
    }

    fn merge_aggregate_locked(&self, guard: &mut ConfigSlot, datums: Vec<AggregateDatum>) -> Result<(), NacosError> {
        let merged: String = datums.iter().map(|d| d.content.as_str()).collect();
        let md5 = md5_hex(&merged);
        let entry = ConfigEntry {
            content: merged,
            content_type: guard
                .entry
                .as_ref()
                .map(|e| e.content_type.clone())
                .unwrap_or_else(|| "text".to_string()),
            md5,
            last_modified: now_millis(),
            encrypted_data_key: None,
            gray: None,
            datums: Some(datums),
        };
        Self::record_history(guard, HistoryOp::AggregateMerge, &entry, self.max_history_per_key);
        metrics::CONFIG_PUBLISHES_TOTAL.with_label_values(&["aggregate"]).inc();
        guard.entry = Some(entry);
        Ok(())
    }

    pub async fn list_datums(&self, key: &ConfigKey) -> Vec<AggregateDatum> {
        let Some(slot) = self.entries.get(key).map(|e| e.clone()) else {
            return vec![];
        };
        let guard = slot.lock().await;
        guard.entry.as_ref().and_then(|e| e.datums.clone()).unwrap_or_default()
    }

    pub async fn count_datums(&self, key: &ConfigKey) -> usize {
        self.list_datums(key).await.len()
    }

    /// `listHistory(key, page, pageSize)` (spec §4.E).
    pub async fn list_history(&self, key: &ConfigKey, page: usize, page_size: usize) -> (Vec<HistoryRecord>, usize) {
        let Some(slot) = self.entries.get(key).map(|e| e.clone()) else {
            return (vec![], 0);
        };
        let guard = slot.lock().await;
        let total = guard.history.len();
        let page = page.max(1);
        let start = (page - 1).saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);
        // newest first
        let mut records: Vec<HistoryRecord> = guard.history.iter().rev().cloned().collect();
        records.truncate(end);
        (records.split_off(start.min(records.len())), total)
    }

    /// `getHistory(key, nid)` (spec §4.E).
    pub async fn get_history(&self, key: &ConfigKey, nid: u64) -> Result<HistoryRecord, NacosError> {
        let slot = self
            .entries
            .get(key)
            .map(|e| e.clone())
            .ok_or_else(|| NacosError::NotFound("no history for key".into()))?;
        let guard = slot.lock().await;
        guard
            .history
            .iter()
            .find(|r| r.nid == nid)
            .cloned()
            .ok_or_else(|| NacosError::NotFound(format!("history record {nid} not found")))
    }

    /// `previousHistory(key, id)` (spec §4.E): the record immediately
    /// preceding `id` in commit order.
    pub async fn previous_history(&self, key: &ConfigKey, id: u64) -> Result<HistoryRecord, NacosError> {
        let slot = self
            .entries
            .get(key)
            .map(|e| e.clone())
            .ok_or_else(|| NacosError::NotFound("no history for key".into()))?;
        let guard = slot.lock().await;
        let idx = guard
            .history
            .iter()
            .position(|r| r.nid == id)
            .ok_or_else(|| NacosError::NotFound(format!("history record {id} not found")))?;
        if idx == 0 {
            return Err(NacosError::NotFound("no earlier history record".into()));
        }
        Ok(guard.history[idx - 1].clone())
    }

    fn record_history(guard: &mut ConfigSlot, op: HistoryOp, entry: &ConfigEntry, max_history: usize) {
        let nid = guard.next_nid;
        guard.next_nid += 1;
        guard.history.push(HistoryRecord {
            nid,
            op,
            content: entry.content.clone(),
            md5: entry.md5.clone(),
            content_type: entry.content_type.clone(),
            modified_at: entry.last_modified,
        });
        if guard.history.len() > max_history {
            let overflow = guard.history.len() - max_history;
            guard.history.drain(0..overflow);
        }
    }

    /// `exportZip(namespace, group?)` (spec §4.E): all entries are
    /// serialized by the caller (see `http::config`), this lists the keys
    /// and resolved base content in scope.
    pub async fn export_entries(&self, namespace: &str, group: Option<&str>) -> Vec<(ConfigKey, ConfigEntry)> {
        let mut out = Vec::new();
        for entry in self.entries.iter() {
            let key = entry.key();
            if key.namespace != namespace {
                continue;
            }
            if let Some(g) = group {
                if key.group != g {
                    continue;
                }
            }
            let guard = entry.value().lock().await;
            if let Some(e) = guard.entry.clone() {
                out.push((key.clone(), e));
            }
        }
        out
    }

    /// `importZip(namespace, bytes, policy)` (spec §4.E). `entries` is the
    /// archive's already-decoded contents (see `http::config::import`).
    pub async fn import_entries(
        &self,
        entries: Vec<(ConfigKey, String, Option<String>)>,
        policy: ImportPolicy,
    ) -> ImportReport {
        let mut report = ImportReport { succeeded: vec![], skipped: vec![], failed: vec![], aborted: false };
        for (key, content, content_type) in entries {
            let exists = self.entries.get(&key).is_some();
            if exists && policy == ImportPolicy::Skip {
                report.skipped.push(key);
                continue;
            }
            if exists && policy == ImportPolicy::Abort {
                report.aborted = true;
                break;
            }
            match self.publish(&key, content, content_type).await {
                Ok(()) => report.succeeded.push(key),
                Err(e) => {
                    report.failed.push((key, e.to_string()));
                    if policy == ImportPolicy::Abort {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }
        report
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn md5_hex(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
