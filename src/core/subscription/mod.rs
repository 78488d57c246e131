// src/core/subscription/mod.rs

//! The Subscription Bus (spec §4.D): lets a session watch a service and
//! receive a push each time a registry mutation changes what it sees.
//!
//! Grounded on `core::pubsub::PubSubManager`'s `DashMap`-of-subscribers
//! shape, but the transport differs on purpose: pub/sub fans a byte
//! message out to an unbounded number of equally-entitled subscribers via
//! `broadcast`, whereas each naming subscriber here wants only the latest
//! `ServiceInfo` for the service it watches, filtered to its own cluster
//! list. `watch::Sender` already coalesces to "most recent value", which
//! is exactly the "coalescing-on-full backpressure" behavior spec §5 asks
//! for, so it replaces `broadcast` for this one-value-per-subscriber case.

use crate::core::metrics;
use crate::core::registry::model::{Service, ServiceInfo, ServiceKey};
use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

struct Subscriber {
    cluster_filter: Vec<String>,
    tx: watch::Sender<ServiceInfo>,
}

#[derive(Default)]
pub struct SubscriptionBus {
    /// service -> (session_id -> subscriber)
    services: DashMap<ServiceKey, DashMap<u64, Subscriber>>,
    /// session_id -> services it has subscribed to, for O(subscriptions) cleanup.
    by_session: DashMap<u64, Vec<ServiceKey>>,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `subscribe(sessionId, svcKey, clusters?)` (spec §4.D). Returns a
    /// receiver the session's push loop should `changed().await` on.
    pub fn subscribe(
        &self,
        key: &ServiceKey,
        session_id: u64,
        cluster_filter: Vec<String>,
        initial: ServiceInfo,
    ) -> watch::Receiver<ServiceInfo> {
        let (tx, rx) = watch::channel(filtered(&initial, &cluster_filter));
        let subscribers = self.services.entry(key.clone()).or_default();
        let is_new = !subscribers.contains_key(&session_id);
        subscribers.insert(session_id, Subscriber { cluster_filter, tx });
        drop(subscribers);

        if is_new {
            self.by_session.entry(session_id).or_default().push(key.clone());
            metrics::ACTIVE_SUBSCRIPTIONS.inc();
        }
        rx
    }

    /// `unsubscribe(sessionId, svcKey)` (spec §4.D).
    pub fn unsubscribe(&self, key: &ServiceKey, session_id: u64) {
        if let Some(subscribers) = self.services.get(key) {
            if subscribers.remove(&session_id).is_some() {
                metrics::ACTIVE_SUBSCRIPTIONS.dec();
            }
        }
        if let Some(mut keys) = self.by_session.get_mut(&session_id) {
            keys.retain(|k| k != key);
        }
    }

    /// Drops every subscription owned by `session_id`, called from the
    /// Session Manager's disconnect cleanup (spec §4.B/§9).
    pub fn unsubscribe_session_all(&self, session_id: u64) {
        let Some((_, keys)) = self.by_session.remove(&session_id) else {
            return;
        };
        for key in keys {
            if let Some(subscribers) = self.services.get(&key) {
                if subscribers.remove(&session_id).is_some() {
                    metrics::ACTIVE_SUBSCRIPTIONS.dec();
                }
            }
        }
    }

    /// Called by the Registry after a mutation commits. Pushes a freshly
    /// filtered snapshot to every subscriber of `key`; a subscriber whose
    /// watch receiver hasn't drained the prior value simply has it
    /// overwritten, which is the coalescing backpressure policy.
    pub async fn publish(&self, key: &ServiceKey, full_snapshot: ServiceInfo) {
        let Some(subscribers) = self.services.get(key) else {
            return;
        };
        for entry in subscribers.iter() {
            let snapshot = filtered(&full_snapshot, &entry.cluster_filter);
            // `send` only fails if every receiver was dropped; the session's
            // disconnect cleanup removes the subscriber promptly in that case.
            if entry.tx.send(snapshot).is_ok() {
                metrics::SUBSCRIBER_PUSHES_TOTAL.inc();
            }
        }
    }

    /// Builds a `ServiceInfo` snapshot directly from a `Service`, used by
    /// the Registry so it never has to know about subscriber filters.
    pub fn snapshot(key: &ServiceKey, service: &Service) -> ServiceInfo {
        let hosts = service
            .clusters
            .values()
            .flat_map(|c| c.instances.values().cloned())
            .collect();
        ServiceInfo {
            namespace: key.namespace.clone(),
            group: key.group.clone(),
            name: key.name.clone(),
            clusters: service.clusters.keys().cloned().collect(),
            hosts,
            cache_millis: 3000,
            checksum: format!("{}:{}", key, service.revision),
            last_ref_time: now_millis(),
        }
    }

    /// Returns a fresh receiver for an already-subscribed (key, session),
    /// used by the RPC push loop when it needs to re-attach a forwarder
    /// without disturbing the subscriber's current coalesced value.
    pub fn receiver_for(&self, key: &ServiceKey, session_id: u64) -> Option<watch::Receiver<ServiceInfo>> {
        self.services.get(key).and_then(|s| s.get(&session_id).map(|sub| sub.tx.subscribe()))
    }

    pub fn subscriber_count(&self, key: &ServiceKey) -> usize {
        self.services.get(key).map_or(0, |s| s.len())
    }
}

fn filtered(snapshot: &ServiceInfo, cluster_filter: &[String]) -> ServiceInfo {
    if cluster_filter.is_empty() {
        return snapshot.clone();
    }
    let mut filtered = snapshot.clone();
    filtered.clusters = cluster_filter.to_vec();
    filtered
        .hosts
        .retain(|i| cluster_filter.contains(&i.cluster));
    filtered
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
