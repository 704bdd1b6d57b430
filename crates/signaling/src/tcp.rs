//! TCP listener: binds the control-plane socket, accepts connections (§4.2, §5)
//!
//! Repository traits use `async_fn_in_trait` without a `Send` bound, so every
//! connection task runs inside a single-threaded `tokio::task::LocalSet`
//! rather than the default multi-threaded executor. TLS is opt-in: a
//! non-empty `certificate_path` wraps every accepted socket with a
//! `TlsAcceptor`; an empty one serves plain TCP, for local development only.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::LocalSet;
use tokio_rustls::TlsAcceptor;

use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

pub struct SignalingServer<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    state: Arc<SignalingState<R>>,
    bind_addr: SocketAddr,
    tls_acceptor: Option<TlsAcceptor>,
}

impl<R> SignalingServer<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    pub fn new(state: Arc<SignalingState<R>>, bind_addr: SocketAddr, tls_acceptor: Option<TlsAcceptor>) -> Self {
        Self { state, bind_addr, tls_acceptor }
    }

    /// Runs until `shutdown_rx` observes `true`. All connection tasks run
    /// inside a `LocalSet` bound to the calling task.
    pub async fn run(self, shutdown_rx: tokio::sync::watch::Receiver<bool>) -> std::io::Result<()> {
        let local = LocalSet::new();
        local.run_until(self.accept_loop(shutdown_rx)).await
    }

    async fn accept_loop(self, mut shutdown_rx: tokio::sync::watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!(addr = %local_addr, tls = self.tls_acceptor.is_some(), "signaling server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let online = self.state.presence.count() as u32;
                            if online >= self.state.config.max_clients {
                                tracing::warn!(peer = %peer_addr, max = self.state.config.max_clients, "connection rejected, server full");
                                drop(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "connection accepted");

                            let connection = ClientConnection::new(Arc::clone(&self.state), peer_addr);
                            let shutdown_rx_clone = shutdown_rx.clone();

                            match self.tls_acceptor.clone() {
                                Some(acceptor) => {
                                    tokio::task::spawn_local(async move {
                                        match acceptor.accept(stream).await {
                                            Ok(tls_stream) => connection.run(tls_stream, shutdown_rx_clone).await,
                                            Err(e) => tracing::warn!(peer = %peer_addr, error = %e, "TLS handshake failed"),
                                        }
                                    });
                                }
                                None => {
                                    tokio::task::spawn_local(async move {
                                        connection.run(stream, shutdown_rx_clone).await;
                                    });
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "TCP accept error");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("signaling server shutting down");
                        break;
                    }
                }
            }
        }

        tracing::info!("signaling server stopped");
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
