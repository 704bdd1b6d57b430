//! Online presence (§4.2)
//!
//! Tracks who is currently authenticated, independent of which channel they
//! are in — channel membership itself lives in `whispr_channels::ChannelManager`,
//! the single source of truth. A second map tracking the same membership
//! here would just be state that can disagree with it.

use dashmap::DashMap;
use whispr_core::types::{ClientId, UserId};

#[derive(Debug, Clone)]
pub struct ClientPresence {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub client_id: Option<ClientId>,
}

/// Authenticated-and-connected set, keyed by user id.
#[derive(Default)]
pub struct PresenceManager {
    clients: DashMap<UserId, ClientPresence>,
}

impl PresenceManager {
    pub fn new() -> Self {
        Self { clients: DashMap::new() }
    }

    pub fn connect(&self, presence: ClientPresence) {
        tracing::info!(user_id = %presence.user_id, username = %presence.username, "client connected");
        self.clients.insert(presence.user_id, presence);
    }

    pub fn disconnect(&self, user_id: UserId) -> Option<ClientPresence> {
        let removed = self.clients.remove(&user_id).map(|(_, v)| v);
        if removed.is_some() {
            tracing::info!(user_id = %user_id, "client disconnected");
        }
        removed
    }

    pub fn set_client_id(&self, user_id: UserId, client_id: ClientId) {
        if let Some(mut entry) = self.clients.get_mut(&user_id) {
            entry.client_id = Some(client_id);
        }
    }

    pub fn get(&self, user_id: UserId) -> Option<ClientPresence> {
        self.clients.get(&user_id).map(|r| r.clone())
    }

    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.clients.contains_key(&user_id)
    }

    pub fn all(&self) -> Vec<ClientPresence> {
        self.clients.iter().map(|r| r.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }
}
