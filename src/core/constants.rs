// src/core/constants.rs

//! Wire-level constants shared by the registry, config store, and both
//! transport surfaces. Values are grounded in the real Nacos protocol, as
//! documented by the batata reimplementation's `crates/batata-api/src/model.rs`.

/// The namespace used when a request omits one.
pub const DEFAULT_NAMESPACE_ID: &str = "public";
/// The group used when a request omits one.
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";
/// The cluster name used when a request omits one.
pub const DEFAULT_CLUSTER_NAME: &str = "DEFAULT";

/// The default RPC listener offset from the HTTP port.
pub const RPC_PORT_DEFAULT_OFFSET: u16 = 1000;

/// Long-poll timeout bounds, per the real Nacos client/server contract.
pub const CONFIG_LONG_POLL_TIMEOUT_MS: u64 = 30_000;
pub const MIN_CONFIG_LONG_POLL_TIMEOUT_MS: u64 = 10_000;

/// Default session keepalive tunables (spec §4.B).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_GRACE_TIMEOUT_MS: u64 = 5_000;
