//! Per-connection TCP task (§4.2, §5)
//!
//! One task per accepted connection: reads frames, dispatches them, writes
//! back whatever the dispatcher returns, and pumps the user's broadcaster
//! mailbox out to the same socket once logged in. A session-local token
//! bucket enforces the 30 control-messages/sec budget; a silent idle
//! connection is dropped after `idle_timeout_secs`, and the server proactively
//! pings every `keepalive_secs`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;

use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_protocol::control::{ControlMessage, ErrorCode};
use whispr_protocol::wire::FrameCodec;

use crate::dispatcher::{MessageDispatcher, SessionContext};
use crate::server_state::SignalingState;

/// Fixed-window counter for a single session's control-message budget.
struct SessionRateLimiter {
    limit: u32,
    window_start: Instant,
    consumed: u32,
}

impl SessionRateLimiter {
    fn new(limit: u32) -> Self {
        Self { limit, window_start: Instant::now(), consumed: 0 }
    }

    fn allow(&mut self) -> bool {
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            self.window_start = Instant::now();
            self.consumed = 0;
        }
        if self.consumed >= self.limit {
            false
        } else {
            self.consumed += 1;
            true
        }
    }
}

pub struct ClientConnection<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    state: Arc<SignalingState<R>>,
    peer_addr: SocketAddr,
}

impl<R> ClientConnection<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    pub fn new(state: Arc<SignalingState<R>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Runs the connection's read/write/keepalive loop. `S` is a plain
    /// `TcpStream` in dev mode or a `tokio_rustls::server::TlsStream` once
    /// `certificate_path` is configured — the loop itself is transport-agnostic.
    pub async fn run<S>(self, stream: S, mut shutdown_rx: tokio::sync::watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let peer_addr = self.peer_addr;
        let keepalive_interval = Duration::from_secs(self.state.config.keepalive_secs);
        let idle_timeout = Duration::from_secs(self.state.config.idle_timeout_secs);

        tracing::info!(peer = %peer_addr, "connection accepted");

        let max_frame_size = whispr_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
        let mut framed = Framed::new(stream, FrameCodec::with_max_size(max_frame_size));

        let (forward_tx, mut forward_rx) = mpsc::channel::<ControlMessage>(64);
        let mut ctx = SessionContext::new(peer_addr);
        let dispatcher = MessageDispatcher::new(Arc::clone(&self.state));
        let mut rate_limiter = SessionRateLimiter::new(self.state.config.control_rate_limit_per_sec);

        let mut last_received = Instant::now();
        let mut next_ping = Instant::now() + keepalive_interval;
        let mut ping_request_id: u32 = 0;

        'outer: loop {
            let now = Instant::now();

            if now.duration_since(last_received) > idle_timeout {
                tracing::warn!(peer = %peer_addr, "connection idle timeout");
                break;
            }

            let ping_delay = if now < next_ping { next_ping.duration_since(now) } else { Duration::from_millis(1) };

            tokio::select! {
                frame = framed.next() => {
                    match frame {
                        Some(Ok(message)) => {
                            last_received = Instant::now();

                            if !rate_limiter.allow() {
                                let reply = ControlMessage::error(message.request_id, ErrorCode::RateLimited, "too many messages");
                                if framed.send(reply).await.is_err() {
                                    break 'outer;
                                }
                                continue;
                            }

                            let replies = dispatcher.dispatch(message, &mut ctx).await;
                            for reply in replies {
                                if let Err(e) = framed.send(reply).await {
                                    tracing::warn!(peer = %peer_addr, error = %e, "send failed");
                                    break 'outer;
                                }
                            }

                            if let Some(uid) = ctx.user_id {
                                if !self.state.broadcaster.is_registered(uid) {
                                    let mut mailbox = self.state.broadcaster.register(uid);
                                    let forward_tx = forward_tx.clone();
                                    tokio::task::spawn_local(async move {
                                        while let Some(msg) = mailbox.recv().await {
                                            if forward_tx.send(msg).await.is_err() {
                                                break;
                                            }
                                        }
                                    });
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, error = %e, "frame read error");
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "connection closed by client");
                            break;
                        }
                    }
                }

                Some(outgoing) = forward_rx.recv() => {
                    if let Err(e) = framed.send(outgoing).await {
                        tracing::warn!(peer = %peer_addr, error = %e, "broadcast send failed");
                        break;
                    }
                }

                _ = tokio::time::sleep(ping_delay) => {
                    if now >= next_ping {
                        ping_request_id = ping_request_id.wrapping_add(1);
                        if let Err(e) = framed.send(ControlMessage::ping(ping_request_id)).await {
                            tracing::warn!(peer = %peer_addr, error = %e, "ping send failed");
                            break;
                        }
                        next_ping = Instant::now() + keepalive_interval;
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "shutdown signal, closing connection");
                        let farewell = ControlMessage::error(0, ErrorCode::InvalidMessage, "server shutting down");
                        let _ = framed.send(farewell).await;
                        break;
                    }
                }
            }
        }

        if let Some(uid) = ctx.user_id {
            dispatcher.client_cleanup(uid, ctx.session_token.as_deref()).await;
        }

        tracing::info!(peer = %peer_addr, "connection task finished");
    }
}
