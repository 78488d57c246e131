// src/core/state/mod.rs

//! The central `ServerState` struct, holding all shared server-wide state.
//! Same role as the teacher's `core::state::core::ServerState`: wrapped in
//! an `Arc` and passed to every connection handler and HTTP route.

use crate::config::{Config, IntoMutex};
use crate::core::acl::SharedIamStore;
use crate::core::acl::enforcer::IamStore;
use crate::core::configstore::ConfigStore;
use crate::core::errors::NacosError;
use crate::core::namespace::{NamespaceStore, SharedNamespaceStore};
use crate::core::notify::NotifyBus;
use crate::core::registry::Registry;
use crate::core::session::SessionManager;
use crate::core::subscription::SubscriptionBus;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing_subscriber::{filter::EnvFilter, reload};

/// Transport-level bookkeeping for a connected RPC session: its peer
/// address and a sender the admin surface (`/v2/ns/client`) can use to
/// force-disconnect it. Distinct from `core::session::SessionManager`,
/// which tracks what the session *owns* rather than how to reach it.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub addr: SocketAddr,
    pub session_id: u64,
    pub connected_at: Instant,
}

pub type ShutdownSender = broadcast::Sender<()>;
pub type ClientMap = Arc<DashMap<u64, (ClientInfo, ShutdownSender)>>;

/// Everything the spawner needs to stand the server up. Mirrors the
/// teacher's `ServerInit`, trimmed to the one channel this server's
/// background tasks actually need: a shared shutdown signal.
pub struct ServerInit {
    pub state: Arc<ServerState>,
    pub shutdown_rx: broadcast::Receiver<()>,
}

/// The central struct holding all shared, server-wide state.
pub struct ServerState {
    pub config: Arc<Mutex<Config>>,
    pub clients: ClientMap,
    pub registry: Arc<Registry>,
    pub subscription_bus: Arc<SubscriptionBus>,
    pub config_store: Arc<ConfigStore>,
    pub notify_bus: Arc<NotifyBus>,
    pub sessions: Arc<SessionManager>,
    pub iam: SharedIamStore,
    pub namespaces: SharedNamespaceStore,
    pub log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    pub shutdown_tx: ShutdownSender,
    pub started_at: Instant,
}

impl ServerState {
    /// Assembles the full dependency graph per spec §9's component list,
    /// wiring the registry/config store to their respective buses the same
    /// way the teacher wires `EventBus`/`PubSubManager` into `ServerState`.
    pub fn initialize(
        config: Config,
        log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    ) -> Result<ServerInit, NacosError> {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let subscription_bus = Arc::new(SubscriptionBus::new());
        let notify_bus = Arc::new(NotifyBus::new());
        let registry = Arc::new(Registry::new(
            subscription_bus.clone(),
            Duration::from_millis(config.registry.empty_service_gc_grace_ms),
        ));
        let config_store = Arc::new(ConfigStore::new(
            notify_bus.clone(),
            config.config_store.max_content_bytes,
            config.config_store.max_history_per_key,
        ));
        let sessions = Arc::new(SessionManager::new(
            registry.clone(),
            notify_bus.clone(),
            subscription_bus.clone(),
            Duration::from_millis(config.session.idle_timeout_ms),
            Duration::from_millis(config.session.grace_period_ms),
        ));
        let iam = Arc::new(IamStore::new(&config.auth)?);
        let namespaces = Arc::new(NamespaceStore::new());

        let state = Arc::new(Self {
            clients: Arc::new(DashMap::new()),
            registry,
            subscription_bus,
            config_store,
            notify_bus,
            sessions,
            iam,
            namespaces,
            log_reload_handle,
            shutdown_tx,
            started_at: Instant::now(),
            config: config.into_mutex(),
        });

        Ok(ServerInit { state, shutdown_rx })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
