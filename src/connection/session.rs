// src/connection/session.rs

//! Per-connection state for a single RPC client: the push-forwarding
//! plumbing that bridges the core's per-subscription `watch` channels onto
//! this connection's single outbound `PushFrame` stream.

use crate::core::protocol::PushFrame;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Holds the state specific to a single client connection. Unlike
/// `core::session::SessionManager`'s `SessionRecord` (which is the
/// authoritative, cross-connection owner of registrations and listens),
/// this is purely local transport plumbing and is dropped with the
/// connection.
pub struct SessionState {
    pub principal: Option<String>,
    pub client_ip: Option<String>,
    push_tx: mpsc::Sender<PushFrame>,
    push_seq: Arc<AtomicU64>,
    /// Background tasks forwarding a `watch::Receiver` onto `push_tx`,
    /// keyed by a string identifying the subscription (service key or
    /// config key). Re-subscribing under the same key replaces (aborts)
    /// the previous forwarder rather than leaking it.
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl SessionState {
    pub fn new(push_tx: mpsc::Sender<PushFrame>) -> Self {
        Self {
            principal: None,
            client_ip: None,
            push_tx,
            push_seq: Arc::new(AtomicU64::new(1)),
            forwarders: HashMap::new(),
        }
    }

    /// A sender/counter pair a spawned forwarder task can own independently
    /// of this `SessionState`, which lives on the connection's own task.
    pub fn push_handle(&self) -> (mpsc::Sender<PushFrame>, Arc<AtomicU64>) {
        (self.push_tx.clone(), self.push_seq.clone())
    }

    pub fn track_forwarder(&mut self, key: String, handle: JoinHandle<()>) {
        if let Some(old) = self.forwarders.insert(key, handle) {
            old.abort();
        }
    }

    pub fn stop_forwarder(&mut self, key: &str) {
        if let Some(handle) = self.forwarders.remove(key) {
            handle.abort();
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }
}
