// src/config.rs

//! Manages server configuration: loading, resolving dynamic values, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// A simple wrapper to allow cloning the config while it's behind a mutex for the `from_file` helper.
pub trait IntoMutex: Sized {
    fn into_mutex(self) -> Arc<Mutex<Self>>;
}

impl IntoMutex for Config {
    fn into_mutex(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }
}

/// Session-manager tunables (§4.B): how long an idle session is tolerated
/// before being closed, and the grace window during which a disconnected
/// session's ephemeral instances/listens are kept alive to absorb a quick
/// reconnect.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_push_channel_capacity")]
    pub push_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            grace_period_ms: default_grace_period_ms(),
            push_channel_capacity: default_push_channel_capacity(),
        }
    }
}

fn default_idle_timeout_ms() -> u64 {
    15_000
}
fn default_grace_period_ms() -> u64 {
    30_000
}
fn default_push_channel_capacity() -> usize {
    256
}

/// Service-registry tunables (§4.C).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegistryConfig {
    /// How long an empty service (no instances, no subscribers) is kept around
    /// before being garbage-collected.
    #[serde(default = "default_empty_service_gc_grace_ms")]
    pub empty_service_gc_grace_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            empty_service_gc_grace_ms: default_empty_service_gc_grace_ms(),
        }
    }
}

fn default_empty_service_gc_grace_ms() -> u64 {
    60_000
}

/// Config-store tunables (§4.E/F).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConfigStoreConfig {
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
    /// Nacos's long-poll convention: clients hold the HTTP connection open for
    /// this long while waiting for a change notification.
    #[serde(default = "default_long_poll_timeout_ms")]
    pub long_poll_timeout_ms: u64,
    #[serde(default = "default_min_long_poll_timeout_ms")]
    pub min_long_poll_timeout_ms: u64,
    #[serde(default = "default_max_history_per_key")]
    pub max_history_per_key: usize,
}

impl Default for ConfigStoreConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: default_max_content_bytes(),
            long_poll_timeout_ms: default_long_poll_timeout_ms(),
            min_long_poll_timeout_ms: default_min_long_poll_timeout_ms(),
            max_history_per_key: default_max_history_per_key(),
        }
    }
}

fn default_max_content_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_long_poll_timeout_ms() -> u64 {
    30_000
}
fn default_min_long_poll_timeout_ms() -> u64 {
    10_000
}
fn default_max_history_per_key() -> usize {
    30
}

/// Authentication/IAM tunables (§4.A). Token signing/verification itself is a
/// pluggable external collaborator (spec.md Non-goals); this only configures
/// the in-process HMAC-based default so the server is runnable standalone.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
    #[serde(default = "default_root_username")]
    pub root_username: String,
    /// Plaintext seed password for the root account at first boot, hashed with
    /// argon2 before being stored. Operators are expected to rotate it.
    #[serde(default = "default_root_password")]
    pub root_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_auth_enabled(),
            token_secret: default_token_secret(),
            token_ttl_seconds: default_token_ttl_seconds(),
            root_username: default_root_username(),
            root_password: default_root_password(),
        }
    }
}

fn default_auth_enabled() -> bool {
    false
}
fn default_token_secret() -> String {
    "changeme-nacos-token-secret".to_string()
}
fn default_token_ttl_seconds() -> u64 {
    18_000
}
fn default_root_username() -> String {
    "nacos".to_string()
}
fn default_root_password() -> String {
    "nacos".to_string()
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    8848 + 2000
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    /// Offset added to `port` to derive the bidirectional RPC listener's port,
    /// following the real Nacos server's `port + 1000` convention.
    #[serde(default = "default_rpc_port_offset")]
    rpc_port_offset: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    registry: RegistryConfig,
    #[serde(default)]
    config_store: ConfigStoreConfig,
    #[serde(default)]
    auth: AuthConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8848
}
fn default_rpc_port_offset() -> u16 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10_000
}

/// Represents the final, validated, and resolved server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rpc_port_offset: u16,
    pub log_level: String,
    pub max_clients: usize,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub config_store: ConfigStoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            rpc_port_offset: default_rpc_port_offset(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            session: SessionConfig::default(),
            registry: RegistryConfig::default(),
            config_store: ConfigStoreConfig::default(),
            auth: AuthConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    pub fn rpc_port(&self) -> u16 {
        self.port.saturating_add(self.rpc_port_offset)
    }

    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let raw: RawConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;

        let config = Config {
            host: raw.host,
            port: raw.port,
            rpc_port_offset: raw.rpc_port_offset,
            log_level: raw.log_level,
            max_clients: raw.max_clients,
            session: raw.session,
            registry: raw.registry,
            config_store: raw.config_store,
            auth: raw.auth,
            metrics: raw.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.rpc_port_offset == 0 {
            return Err(anyhow!("rpc_port_offset cannot be 0 (RPC port would collide with the HTTP port)"));
        }
        if self.config_store.min_long_poll_timeout_ms > self.config_store.long_poll_timeout_ms {
            return Err(anyhow!(
                "config_store.min_long_poll_timeout_ms cannot exceed long_poll_timeout_ms"
            ));
        }
        if self.auth.enabled && self.auth.token_secret.len() < 8 {
            warn!("auth.token_secret is short; use a longer secret in production");
        }
        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port || self.metrics.port == self.rpc_port() {
                return Err(anyhow!(
                    "metrics.port cannot collide with the HTTP or RPC port"
                ));
            }
        }
        Ok(())
    }
}
