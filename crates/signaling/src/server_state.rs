//! Shared signaling state (§4.1, §4.2)
//!
//! One [`SignalingState`] is built at startup and `Arc`-shared into every
//! connection task. `R` is a single repository type that implements all
//! four `whispr-db` traits — `SqliteDb` satisfies this, so callers never
//! juggle three separate generic parameters for one pool.

use std::sync::Arc;
use std::time::Instant;

use whispr_auth::{AuthService, PermissionService};
use whispr_chat::ChatService;
use whispr_channels::ChannelManager;
use whispr_core::types::ServerId;
use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_voice::UdpEndpointRegistry;

use crate::broadcast::EventBroadcaster;
use crate::presence::PresenceManager;

/// Session-router tuning (§3, §5).
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    pub server_id: ServerId,
    pub server_name: String,
    /// Hard cap on concurrent sessions; the accept loop drops connections
    /// past this limit (§5).
    pub max_clients: u32,
    /// Clients send `Ping` every 25s (§5); the router expects one at least
    /// this often and disconnects on `idle_timeout_secs` silence.
    pub keepalive_secs: u64,
    /// TLS read-idle timeout (§5: 60s).
    pub idle_timeout_secs: u64,
    /// Per-session control message budget (§5: 30 msgs/sec).
    pub control_rate_limit_per_sec: u32,
    pub token_lifetime_hours: i64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_id: ServerId::new(),
            server_name: "Whispr".to_string(),
            max_clients: 512,
            keepalive_secs: 25,
            idle_timeout_secs: 60,
            control_rate_limit_per_sec: 30,
            token_lifetime_hours: 24,
        }
    }
}

/// Shared, `Arc`-wrapped router state. Every field here is itself cheaply
/// cloneable (`Arc` or a `Clone`-able handle), so connection tasks hold an
/// `Arc<SignalingState<R>>` rather than borrowing.
pub struct SignalingState<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    pub config: Arc<SignalingConfig>,
    pub auth_service: Arc<AuthService<R>>,
    pub permission_service: Arc<PermissionService<R>>,
    pub chat_service: Arc<ChatService<R>>,
    pub db: Arc<R>,
    pub channels: Arc<ChannelManager>,
    pub udp_registry: Arc<UdpEndpointRegistry>,
    pub presence: PresenceManager,
    pub broadcaster: EventBroadcaster,
    pub start_time: Instant,
}

impl<R> SignalingState<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SignalingConfig,
        auth_service: Arc<AuthService<R>>,
        permission_service: Arc<PermissionService<R>>,
        chat_service: Arc<ChatService<R>>,
        db: Arc<R>,
        channels: Arc<ChannelManager>,
        udp_registry: Arc<UdpEndpointRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            auth_service,
            permission_service,
            chat_service,
            db,
            channels,
            udp_registry,
            presence: PresenceManager::new(),
            broadcaster: EventBroadcaster::new(),
            start_time: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
