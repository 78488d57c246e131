// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests.

use nacosd::config::Config;
use nacosd::core::state::ServerState;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

/// A complete, wired-up `ServerState` for exercising the core components
/// together without going through either transport.
pub struct TestContext {
    pub state: Arc<ServerState>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let env_filter = EnvFilter::new("warn");
        let (filter, reload_handle) = reload::Layer::new(env_filter);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
        let reload_handle = Arc::new(reload_handle);

        let server_init = ServerState::initialize(config, reload_handle)
            .expect("Failed to initialize server state");

        Self { state: server_init.state }
    }
}
