//! Audio Relay (§4.7)
//!
//! A single task reads the bound UDP socket and a single shared writer
//! forwards datagrams; there is no per-client send task or queue. The send
//! path is synchronous, non-blocking, and never awaits on back-pressure —
//! `try_send_to` drops silently if the kernel socket buffer is full, which
//! is the correct behavior for a pure UDP mirror with no retransmission
//! (§5, "Ordering: no reordering or retransmit; the relay is a pure UDP
//! mirror").

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use whispr_channels::ChannelManager;
use whispr_core::types::ClientId;
use whispr_protocol::audio::{AudioHeader, MAX_DATAGRAM_LEN};

use crate::rate_limiter::RateLimiter;
use crate::registry::UdpEndpointRegistry;

pub struct AudioRelay {
    socket: Arc<UdpSocket>,
    registry: Arc<UdpEndpointRegistry>,
    channels: Arc<ChannelManager>,
    limiter: RateLimiter,
}

impl AudioRelay {
    pub async fn bind(
        bind_addr: SocketAddr,
        registry: Arc<UdpEndpointRegistry>,
        channels: Arc<ChannelManager>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        tracing::info!(addr = %bind_addr, "audio relay bound");
        Ok(Self {
            socket: Arc::new(socket),
            registry,
            channels,
            limiter: RateLimiter::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the receive loop until `shutdown_rx` fires.
    pub async fn run(&self, mut shutdown_rx: tokio::sync::oneshot::Receiver<()>) {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        tracing::info!("audio relay receive loop started");

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, src_addr)) => self.handle_datagram(&buf[..len], src_addr),
                        Err(e) => {
                            tracing::error!(error = %e, "udp recv error");
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::info!("audio relay shutting down");
                    break;
                }
            }
        }
    }

    /// Hot-path packet processing. Every failure mode is a silent drop —
    /// the relay never replies to malformed or unauthorized traffic.
    fn handle_datagram(&self, datagram: &[u8], src_addr: SocketAddr) {
        let (header, _body) = match AudioHeader::parse(datagram) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, src = %src_addr, "malformed audio datagram");
                return;
            }
        };

        let client_id = ClientId(header.client_id);
        let Some(user_id) = self.registry.user_id_for_client(client_id) else {
            tracing::debug!(client_id = %client_id, src = %src_addr, "datagram from unknown client id");
            return;
        };

        if !self.limiter.allow(client_id) {
            tracing::debug!(client_id = %client_id, "audio rate limit exceeded, dropping");
            return;
        }

        self.registry.record_endpoint(client_id, src_addr);

        let Some(channel_id) = self.channels.get_user_channel(user_id) else {
            tracing::trace!(user_id = %user_id, "datagram from user not in a channel");
            return;
        };

        let mut forwarded = 0usize;
        for member in self.channels.get_other_members(channel_id, user_id) {
            let Some(endpoint) = self.registry.endpoint_for_user(member) else {
                continue;
            };
            match self.socket.try_send_to(datagram, endpoint) {
                Ok(_) => forwarded += 1,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    tracing::warn!(to = %endpoint, "udp send buffer full, dropping");
                }
                Err(e) => {
                    tracing::warn!(error = %e, to = %endpoint, "udp send error");
                }
            }
        }

        tracing::trace!(user_id = %user_id, channel_id = %channel_id, forwarded, "audio datagram relayed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use whispr_channels::{ChannelManager, SeedChannel};
    use whispr_core::types::{ChannelId, ChannelType, UserId};

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn sample_datagram(client_id: u32) -> Vec<u8> {
        let header = AudioHeader { client_id, nonce: [9u8; 12] };
        let mut buf = header.encode().to_vec();
        buf.extend(std::iter::repeat(0xAB).take(40));
        buf
    }

    async fn channel_with_two_members() -> (Arc<ChannelManager>, ChannelId, UserId, UserId) {
        let channel_id = ChannelId::new();
        let channels = Arc::new(ChannelManager::new(vec![SeedChannel {
            id: channel_id,
            name: "General".into(),
            channel_type: ChannelType::Voice,
            is_default: true,
            key_material: Some(vec![1; 32]),
        }]));
        let alice = UserId::new();
        let bob = UserId::new();
        channels.join_channel(alice, channel_id).unwrap();
        channels.join_channel(bob, channel_id).unwrap();
        (channels, channel_id, alice, bob)
    }

    #[tokio::test]
    async fn fans_out_to_other_channel_members_only() {
        let (channels, _channel_id, alice, bob) = channel_with_two_members().await;
        let registry = Arc::new(UdpEndpointRegistry::new());

        let relay = AudioRelay::bind(localhost(0), Arc::clone(&registry), Arc::clone(&channels))
            .await
            .unwrap();
        let relay_addr = relay.local_addr().unwrap();

        let alice_sock = UdpSocket::bind(localhost(0)).await.unwrap();
        let bob_sock = UdpSocket::bind(localhost(0)).await.unwrap();

        let alice_client_id = registry.allocate(alice);
        let bob_client_id = registry.allocate(bob);
        registry.record_endpoint(alice_client_id, alice_sock.local_addr().unwrap());
        registry.record_endpoint(bob_client_id, bob_sock.local_addr().unwrap());

        let datagram = sample_datagram(alice_client_id.inner());
        relay.handle_datagram(&datagram, alice_sock.local_addr().unwrap());

        // The forward happens via try_send_to synchronously inside
        // handle_datagram, so bob's socket should already have it queued.
        let mut recv_buf = [0u8; MAX_DATAGRAM_LEN];
        let (len, _) = tokio::time::timeout(std::time::Duration::from_millis(200), bob_sock.recv_from(&mut recv_buf))
            .await
            .expect("bob should receive the relayed datagram")
            .unwrap();
        assert_eq!(&recv_buf[..len], datagram.as_slice());

        let alice_empty = alice_sock.try_recv(&mut recv_buf);
        assert!(alice_empty.is_err(), "sender must not receive an echo");
        let _ = relay_addr;
    }

    #[tokio::test]
    async fn drops_datagram_from_unknown_client_id() {
        let (channels, _channel_id, _alice, _bob) = channel_with_two_members().await;
        let registry = Arc::new(UdpEndpointRegistry::new());
        let relay = AudioRelay::bind(localhost(0), Arc::clone(&registry), channels).await.unwrap();

        let datagram = sample_datagram(0xFFFF_FFFF);
        // Should not panic and should simply be a no-op.
        relay.handle_datagram(&datagram, localhost(1));
    }

    #[tokio::test]
    async fn drops_datagram_from_user_with_no_channel() {
        let channels = Arc::new(ChannelManager::new(Vec::new()));
        let registry = Arc::new(UdpEndpointRegistry::new());
        let relay = AudioRelay::bind(localhost(0), Arc::clone(&registry), channels).await.unwrap();

        let user = UserId::new();
        let client_id = registry.allocate(user);
        let datagram = sample_datagram(client_id.inner());
        relay.handle_datagram(&datagram, localhost(2));
    }
}
