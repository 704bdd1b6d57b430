//! whispr-server – binary-crate root
//!
//! Wires the config-loaded settings into the repository pool, the domain
//! services, and the two network listeners (TCP control plane, UDP audio
//! relay), then runs until `Ctrl-C`.

pub mod config;
pub mod tls;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use config::ServerConfig;
use whispr_auth::{password, AuthService, PermissionService, SessionStore};
use whispr_channels::{generate_voice_key, ChannelManager, SeedChannel};
use whispr_chat::{ChatService, MessageCipher};
use whispr_core::types::{ChannelId, ChannelType, ServerId};
use whispr_db::repository::DatabaseConfig;
use whispr_db::sqlite::SqliteDb;
use whispr_db::{ChannelRepository, UserRepository};
use whispr_db::models::{NewChannel, NewUser};
use whispr_signaling::{SignalingConfig, SignalingServer, SignalingState};
use whispr_voice::{AudioRelay, UdpEndpointRegistry};

/// Holds the running server's configuration.
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Opens the database, seeds defaults, starts both listeners, and runs
    /// until `Ctrl-C` / `SIGTERM` is received.
    pub async fn run(self) -> Result<()> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let db_config = DatabaseConfig::from_path(&self.config.database_path);
        let db = Arc::new(SqliteDb::open(&db_config).await.context("opening database")?);

        let channels = self.load_or_seed_channels(&db).await?;

        if self.config.seed_test_users {
            self.seed_admin_user(&db).await?;
        }

        let session_store = SessionStore::new(self.config.token_lifetime_hours);
        let auth_service = Arc::new(AuthService::with_auto_register(
            Arc::clone(&db),
            session_store,
            self.config.allow_auto_registration,
        ));
        let permission_service = PermissionService::new(Arc::clone(&db));
        let cipher = MessageCipher::from_env().context("loading message encryption key")?;
        let chat_service = ChatService::new(Arc::clone(&db), cipher);
        let udp_registry = Arc::new(UdpEndpointRegistry::new());

        let signaling_config = SignalingConfig {
            server_id: ServerId::new(),
            server_name: "Whispr".to_string(),
            token_lifetime_hours: self.config.token_lifetime_hours,
            ..SignalingConfig::default()
        };

        let state = SignalingState::new(
            signaling_config,
            auth_service,
            permission_service,
            chat_service,
            Arc::clone(&db),
            Arc::clone(&channels),
            Arc::clone(&udp_registry),
        );

        let tls_acceptor = tls::load_acceptor(&self.config.certificate_path).context("loading TLS certificate")?;

        let control_addr: SocketAddr = self.config.control_bind_addr().parse().context("parsing control_port")?;
        let audio_addr: SocketAddr = self.config.audio_bind_addr().parse().context("parsing audio_port")?;

        tracing::info!(
            control = %control_addr,
            audio = %audio_addr,
            tls = self.config.tls_enabled(),
            "whispr server starting"
        );

        let signaling_server = SignalingServer::new(state, control_addr, tls_acceptor);
        let audio_relay = AudioRelay::bind(audio_addr, udp_registry, channels).await.context("binding audio relay")?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let (audio_shutdown_tx, audio_shutdown_rx) = tokio::sync::oneshot::channel();

        // `SignalingServer::run` spawns its connection tasks on a `LocalSet`
        // (§ whispr-signaling, repository traits aren't `Send`), so its
        // future isn't `Send` either — it must be awaited directly here
        // rather than handed to `tokio::task::spawn`.
        let ctrl_c_task = tokio::task::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, stopping");
            let _ = shutdown_tx.send(true);
            let _ = audio_shutdown_tx.send(());
        });

        tracing::info!("whispr server running, waiting for shutdown signal (Ctrl-C)");
        let (signaling_result, ()) =
            tokio::join!(signaling_server.run(shutdown_rx), audio_relay.run(audio_shutdown_rx));

        let _ = ctrl_c_task.await;
        signaling_result.context("signaling server failed")?;

        Ok(())
    }

    /// Loads the persisted channel rows into a `ChannelManager`, creating
    /// the default "General" voice channel and "Chat" text channel on a
    /// fresh database (acceptance test #1).
    async fn load_or_seed_channels(&self, db: &Arc<SqliteDb>) -> Result<Arc<ChannelManager>> {
        let mut rows = ChannelRepository::list(db.as_ref()).await.context("listing channels")?;

        if rows.is_empty() {
            ChannelRepository::create(
                db.as_ref(),
                NewChannel {
                    name: "General",
                    channel_type: ChannelType::Voice,
                    is_default: true,
                    key_material: Some(generate_voice_key()),
                },
            )
            .await
            .context("seeding General channel")?;
            ChannelRepository::create(
                db.as_ref(),
                NewChannel { name: "Chat", channel_type: ChannelType::Text, is_default: false, key_material: None },
            )
            .await
            .context("seeding Chat channel")?;
            rows = ChannelRepository::list(db.as_ref()).await.context("listing channels after seeding")?;
        }

        let seed = rows
            .into_iter()
            .map(|row| SeedChannel {
                id: ChannelId(row.id),
                name: row.name,
                channel_type: row.channel_type,
                is_default: row.is_default,
                key_material: row.key_material,
            })
            .collect();

        Ok(Arc::new(ChannelManager::new(seed)))
    }

    async fn seed_admin_user(&self, db: &Arc<SqliteDb>) -> Result<()> {
        if db.get_by_username("admin").await.context("checking for admin user")?.is_some() {
            return Ok(());
        }

        let password_hash = password::hash_password("admin").context("hashing seed admin password")?;
        UserRepository::create(db.as_ref(), NewUser { username: "admin", password_hash: &password_hash, is_admin: true })
            .await
            .context("seeding admin user")?;

        tracing::warn!("seeded default admin/admin account — change this password before exposing the server");
        Ok(())
    }
}
