// src/core/session/mod.rs

//! The Session Manager (spec §4.B): a session is the sole owner of its
//! ephemeral registrations and config listens. Grounded on
//! `connection::guard::ConnectionGuard`'s RAII-on-`Drop` cleanup pattern,
//! generalized into an explicit, idempotent `close`/`on_disconnect` path
//! so cleanup can also be driven by the idle-keepalive sweep, not only by
//! the connection's own `Drop`.

use crate::core::configstore::ConfigKey;
use crate::core::metrics;
use crate::core::notify::NotifyBus;
use crate::core::registry::{InstanceKey, Registry, ServiceKey};
use crate::core::subscription::SubscriptionBus;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct SessionRecord {
    principal: Option<String>,
    client_ip: Option<String>,
    owned_instances: HashSet<(ServiceKey, InstanceKey)>,
    owned_listens: HashSet<ConfigKey>,
    subscribed_services: HashSet<ServiceKey>,
    last_seen: Instant,
    closed: bool,
}

pub struct SessionManager {
    sessions: DashMap<u64, Arc<Mutex<SessionRecord>>>,
    next_id: AtomicU64,
    registry: Arc<Registry>,
    notify_bus: Arc<NotifyBus>,
    subscription_bus: Arc<SubscriptionBus>,
    idle_timeout: Duration,
    grace_period: Duration,
}

impl SessionManager {
    pub fn new(
        registry: Arc<Registry>,
        notify_bus: Arc<NotifyBus>,
        subscription_bus: Arc<SubscriptionBus>,
        idle_timeout: Duration,
        grace_period: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            registry,
            notify_bus,
            subscription_bus,
            idle_timeout,
            grace_period,
        }
    }

    /// `open(transport, credentials?) -> sessionId` (spec §4.B). Credential
    /// verification happens in the caller (the `IamStore`); this just
    /// records the resulting principal, if any.
    pub fn open(&self, principal: Option<String>, client_ip: Option<String>) -> u64 {
        let session_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(
            session_id,
            Arc::new(Mutex::new(SessionRecord {
                principal,
                client_ip,
                owned_instances: HashSet::new(),
                owned_listens: HashSet::new(),
                subscribed_services: HashSet::new(),
                last_seen: Instant::now(),
                closed: false,
            })),
        );
        metrics::CONNECTED_SESSIONS.inc();
        metrics::SESSIONS_OPENED_TOTAL.inc();
        session_id
    }

    /// `heartbeat(sessionId)` (spec §4.B): extends the keepalive deadline.
    /// Returns `false` if the session is unknown or already closed, so the
    /// caller can reply `SessionClosed`.
    pub async fn heartbeat(&self, session_id: u64) -> bool {
        let Some(record) = self.sessions.get(&session_id).map(|e| e.clone()) else {
            return false;
        };
        let mut guard = record.lock().await;
        if guard.closed {
            return false;
        }
        guard.last_seen = Instant::now();
        true
    }

    pub fn client_ip(&self, session_id: u64) -> Option<String> {
        self.sessions.get(&session_id)?.try_lock().ok()?.client_ip.clone()
    }

    pub fn principal(&self, session_id: u64) -> Option<String> {
        self.sessions.get(&session_id)?.try_lock().ok()?.principal.clone()
    }

    /// Records the principal once `ConnectionSetup` has authenticated it.
    /// A no-op on an unknown or already-closed session.
    pub fn set_principal(&self, session_id: u64, principal: String) {
        if let Some(record) = self.sessions.get(&session_id) {
            if let Ok(mut guard) = record.try_lock() {
                guard.principal = Some(principal);
            }
        }
    }

    pub fn is_open(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn track_instance(&self, session_id: u64, key: ServiceKey, ikey: InstanceKey) {
        if let Some(record) = self.sessions.get(&session_id) {
            if let Ok(mut guard) = record.try_lock() {
                guard.owned_instances.insert((key, ikey));
            }
        }
    }

    pub fn untrack_instance(&self, session_id: u64, key: &ServiceKey, ikey: &InstanceKey) {
        if let Some(record) = self.sessions.get(&session_id) {
            if let Ok(mut guard) = record.try_lock() {
                guard.owned_instances.remove(&(key.clone(), ikey.clone()));
            }
        }
    }

    pub fn track_listen(&self, session_id: u64, key: ConfigKey) {
        if let Some(record) = self.sessions.get(&session_id) {
            if let Ok(mut guard) = record.try_lock() {
                guard.owned_listens.insert(key);
            }
        }
    }

    pub fn untrack_listen(&self, session_id: u64, key: &ConfigKey) {
        if let Some(record) = self.sessions.get(&session_id) {
            if let Ok(mut guard) = record.try_lock() {
                guard.owned_listens.remove(key);
            }
        }
    }

    pub fn track_subscription(&self, session_id: u64, key: ServiceKey) {
        if let Some(record) = self.sessions.get(&session_id) {
            if let Ok(mut guard) = record.try_lock() {
                guard.subscribed_services.insert(key);
            }
        }
    }

    pub fn untrack_subscription(&self, session_id: u64, key: &ServiceKey) {
        if let Some(record) = self.sessions.get(&session_id) {
            if let Ok(mut guard) = record.try_lock() {
                guard.subscribed_services.remove(key);
            }
        }
    }

    /// `close(sessionId)` / `onDisconnect(sessionId)` (spec §4.B): the same
    /// idempotent, ordered cleanup path either way. Runs under the
    /// session's own lock, so a message racing the close sees `closed` and
    /// is rejected rather than resurrecting a resource.
    pub async fn close(&self, session_id: u64) {
        let Some(record) = self.sessions.get(&session_id).map(|e| e.clone()) else {
            return;
        };
        let mut guard = record.lock().await;
        if guard.closed {
            return;
        }
        guard.closed = true;

        for (key, ikey) in guard.owned_instances.drain() {
            self.registry.deregister(&key, &ikey).await.ok();
        }
        let listens: Vec<ConfigKey> = guard.owned_listens.drain().collect();
        self.notify_bus.unlisten(session_id, &listens);
        for key in guard.subscribed_services.drain() {
            self.subscription_bus.unsubscribe(&key, session_id);
        }
        drop(guard);

        self.sessions.remove(&session_id);
        metrics::CONNECTED_SESSIONS.dec();
        metrics::SESSIONS_CLOSED_TOTAL.inc();
    }

    pub async fn on_disconnect(&self, session_id: u64) {
        self.close(session_id).await;
    }

    /// Keepalive sweep (spec §4.B): a session idle past `idle_timeout +
    /// grace_period` with no heartbeat response is closed. The actual
    /// ping/response round-trip is driven by the RPC transport; this sweep
    /// is the backstop that fires when nothing renewed `last_seen`.
    pub async fn sweep_idle(&self) {
        let stale: Vec<u64> = self
            .sessions
            .iter()
            .filter(|e| {
                e.try_lock()
                    .map(|g| !g.closed && g.last_seen.elapsed() > self.idle_timeout + self.grace_period)
                    .unwrap_or(false)
            })
            .map(|e| *e.key())
            .collect();
        for session_id in stale {
            self.close(session_id).await;
        }
    }

    pub fn connected_count(&self) -> usize {
        self.sessions.len()
    }
}
