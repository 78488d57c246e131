// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// An RAII guard that ensures a closed connection's session is released from
/// `SessionManager` (and, transitively, the registry/notify/subscription
/// buses it owns entries in) even if the connection's event loop exits via
/// an error path rather than a clean `close` request.
pub struct ConnectionGuard {
    state: Arc<ServerState>,
    session_id: u64,
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64, addr: SocketAddr) -> Self {
        Self { state, session_id, addr }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(session_id = self.session_id, addr = %self.addr, "connection closing, releasing session");
        let state = self.state.clone();
        let session_id = self.session_id;
        tokio::spawn(async move {
            state.sessions.on_disconnect(session_id).await;
        });
    }
}
