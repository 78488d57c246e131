// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    // --- Session Manager ---
    pub static ref CONNECTED_SESSIONS: Gauge =
        register_gauge!("nacos_connected_sessions", "Number of currently connected RPC sessions.").unwrap();
    pub static ref SESSIONS_OPENED_TOTAL: Counter =
        register_counter!("nacos_sessions_opened_total", "Total number of sessions opened since startup.").unwrap();
    pub static ref SESSIONS_CLOSED_TOTAL: Counter =
        register_counter!("nacos_sessions_closed_total", "Total number of sessions closed since startup.").unwrap();

    // --- Service Registry ---
    pub static ref REGISTERED_SERVICES: Gauge =
        register_gauge!("nacos_registered_services", "Number of distinct services currently registered.").unwrap();
    pub static ref REGISTERED_INSTANCES: Gauge =
        register_gauge!("nacos_registered_instances", "Number of instances currently registered across all services.").unwrap();
    pub static ref REGISTRY_MUTATIONS_TOTAL: CounterVec =
        register_counter_vec!("nacos_registry_mutations_total", "Total registry mutations, labeled by operation.", &["op"]).unwrap();

    // --- Subscription Bus ---
    pub static ref ACTIVE_SUBSCRIPTIONS: Gauge =
        register_gauge!("nacos_active_subscriptions", "Number of active (session, service) subscriptions.").unwrap();
    pub static ref SUBSCRIBER_PUSHES_TOTAL: Counter =
        register_counter!("nacos_subscriber_pushes_total", "Total number of NotifySubscriber pushes sent.").unwrap();

    // --- Config Store / Notify Bus ---
    pub static ref CONFIG_ENTRIES: Gauge =
        register_gauge!("nacos_config_entries", "Number of config entries currently stored.").unwrap();
    pub static ref CONFIG_PUBLISHES_TOTAL: CounterVec =
        register_counter_vec!("nacos_config_publishes_total", "Total config publishes, labeled by kind (normal/beta/aggregate).", &["kind"]).unwrap();
    pub static ref ACTIVE_CONFIG_LISTENS: Gauge =
        register_gauge!("nacos_active_config_listens", "Number of active (session, dataId) config listens.").unwrap();
    pub static ref CONFIG_NOTIFY_PUSHES_TOTAL: Counter =
        register_counter!("nacos_config_notify_pushes_total", "Total number of ConfigChangeNotify pushes sent.").unwrap();

    // --- Transport ---
    pub static ref RPC_REQUESTS_TOTAL: CounterVec =
        register_counter_vec!("nacos_rpc_requests_total", "Total RPC requests handled, labeled by request kind.", &["kind"]).unwrap();
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec =
        register_counter_vec!("nacos_http_requests_total", "Total HTTP requests handled, labeled by route.", &["route"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
