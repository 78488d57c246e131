// src/connection/handler.rs

//! Manages the full lifecycle of a client RPC connection: frames requests
//! off the wire, dispatches each one through `Dispatcher`, and forwards
//! asynchronous pushes from the subscription/notify buses onto the same
//! connection's outbound stream.

use super::guard::ConnectionGuard;
use super::session::SessionState;
use crate::core::errors::NacosError;
use crate::core::handler::{Dispatcher, PushAction};
use crate::core::protocol::{PushFrame, RequestFrame, ResponseFrame, RpcCodec, ServerPush};
use crate::core::state::ServerState;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Bounded so a slow/stuck client backs up its own forwarder tasks rather
/// than the whole server; the watch channels underneath already coalesce,
/// so a full push queue only ever means "this client is behind", not data
/// loss for anyone else.
const PUSH_CHANNEL_CAPACITY: usize = 256;

pub struct ConnectionHandler {
    socket: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
    session_id: u64,
    shutdown_rx: broadcast::Receiver<()>,
    global_shutdown_rx: broadcast::Receiver<()>,
}

impl ConnectionHandler {
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        session_id: u64,
        shutdown_rx: broadcast::Receiver<()>,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self { socket, addr, state, session_id, shutdown_rx, global_shutdown_rx }
    }

    pub async fn run(self) -> Result<(), NacosError> {
        let ConnectionHandler { socket, addr, state, session_id, mut shutdown_rx, mut global_shutdown_rx } = self;

        let _guard = ConnectionGuard::new(state.clone(), session_id, addr);
        let dispatcher = Dispatcher::new(state.clone());

        let (push_tx, mut push_rx) = mpsc::channel::<PushFrame>(PUSH_CHANNEL_CAPACITY);
        let mut session = SessionState::new(push_tx);
        session.client_ip = Some(addr.ip().to_string());
        let client_ip = session.client_ip.clone();

        let mut framed = Framed::new(socket, RpcCodec::default());

        'main_loop: loop {
            tokio::select! {
                biased;
                _ = global_shutdown_rx.recv() => {
                    info!(session_id, %addr, "global shutdown, closing connection");
                    let reset = PushFrame {
                        push_id: 0,
                        push: ServerPush::ConnectResetRequest { reason: "server shutting down".to_string() },
                    };
                    let _ = framed.send(reset).await;
                    break 'main_loop;
                }
                _ = shutdown_rx.recv() => {
                    info!(session_id, %addr, "session kill signal received");
                    break 'main_loop;
                }
                push = push_rx.recv() => {
                    match push {
                        Some(frame) => {
                            if let Err(e) = framed.send(frame).await {
                                warn!(session_id, error = %e, "failed to send push frame");
                                break 'main_loop;
                            }
                        }
                        None => {
                            // All forwarders dropped their sender; nothing left to push,
                            // but the request side of the connection is unaffected.
                        }
                    }
                }
                result = framed.next() => {
                    match result {
                        Some(Ok(request_frame)) => {
                            let RequestFrame { request_id, request } = request_frame;
                            let (response, actions) = dispatcher.dispatch(session_id, client_ip.as_deref(), request).await;
                            for action in actions {
                                apply_push_action(&mut session, action);
                            }
                            if let Err(e) = framed.send(ResponseFrame { request_id, response }).await {
                                warn!(session_id, error = %e, "failed to send response frame");
                                break 'main_loop;
                            }
                        }
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!(session_id, "connection closed by peer");
                            } else {
                                warn!(session_id, error = %e, "connection error");
                            }
                            break 'main_loop;
                        }
                        None => {
                            debug!(session_id, "connection closed by peer");
                            break 'main_loop;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Spawns or cancels the forwarder task backing a `PushAction`, bridging
/// the core's `watch::Receiver` onto this connection's single outbound
/// `mpsc::Sender<PushFrame>`.
fn apply_push_action(session: &mut SessionState, action: PushAction) {
    let (push_tx, push_seq) = session.push_handle();
    match action {
        PushAction::StartService(key, mut rx) => {
            let forwarder_key = format!("svc:{key}");
            let handle = tokio::spawn(async move {
                loop {
                    if rx.changed().await.is_err() {
                        return;
                    }
                    let info = rx.borrow_and_update().clone();
                    let push_id = push_seq.fetch_add(1, Ordering::Relaxed);
                    if push_tx.send(PushFrame { push_id, push: ServerPush::NotifySubscriber(info) }).await.is_err() {
                        return;
                    }
                }
            });
            session.track_forwarder(forwarder_key, handle);
        }
        PushAction::StopService(key) => {
            session.stop_forwarder(&format!("svc:{key}"));
        }
        PushAction::StartConfig(key, mut rx) => {
            let forwarder_key = format!("cfg:{key}");
            let handle = tokio::spawn(async move {
                loop {
                    if rx.changed().await.is_err() {
                        return;
                    }
                    let notify = rx.borrow_and_update().clone();
                    let push_id = push_seq.fetch_add(1, Ordering::Relaxed);
                    if push_tx.send(PushFrame { push_id, push: ServerPush::ConfigChangeNotify(notify) }).await.is_err() {
                        return;
                    }
                }
            });
            session.track_forwarder(forwarder_key, handle);
        }
        PushAction::StopConfig(key) => {
            session.stop_forwarder(&format!("cfg:{key}"));
        }
    }
}

fn is_normal_disconnect(e: &NacosError) -> bool {
    matches!(e, NacosError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
