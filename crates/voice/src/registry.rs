//! UDP Endpoint Registry (§4.6)
//!
//! Three concurrent maps tie a server-assigned `ClientId` to a `UserId` and
//! to the most recently observed UDP source address. `DashMap` gives
//! lock-free reads on the relay's hot path; allocation and teardown touch
//! all three maps but never hold a lock across the others (each map is its
//! own independent critical section).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use whispr_core::types::{ClientId, UserId};

/// Registers UDP endpoints for connected clients and allocates client ids.
pub struct UdpEndpointRegistry {
    client_to_user: DashMap<ClientId, UserId>,
    user_to_client: DashMap<UserId, ClientId>,
    user_to_endpoint: DashMap<UserId, Option<SocketAddr>>,
    next_id: AtomicU32,
}

impl UdpEndpointRegistry {
    pub fn new() -> Self {
        Self {
            client_to_user: DashMap::new(),
            user_to_client: DashMap::new(),
            user_to_endpoint: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Allocates the next unused client id for `user_id` and records the
    /// bidirectional mapping. The endpoint is unknown until the client's
    /// first audio datagram arrives.
    pub fn allocate(&self, user_id: UserId) -> ClientId {
        let client_id = loop {
            let candidate = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
            if !self.client_to_user.contains_key(&candidate) {
                break candidate;
            }
        };

        self.client_to_user.insert(client_id, user_id);
        self.user_to_client.insert(user_id, client_id);
        self.user_to_endpoint.insert(user_id, None);

        tracing::info!(user_id = %user_id, client_id = %client_id, "udp client id allocated");
        client_id
    }

    /// Binds or rebinds `client_id`'s observed source address. Clients may
    /// rotate source ports (NAT rebinding); the latest observation wins.
    /// Returns the owning user, or `None` if `client_id` is not registered.
    pub fn record_endpoint(&self, client_id: ClientId, endpoint: SocketAddr) -> Option<UserId> {
        let user_id = *self.client_to_user.get(&client_id)?;
        self.user_to_endpoint.insert(user_id, Some(endpoint));
        Some(user_id)
    }

    pub fn user_id_for_client(&self, client_id: ClientId) -> Option<UserId> {
        self.client_to_user.get(&client_id).map(|r| *r)
    }

    pub fn client_id_for_user(&self, user_id: UserId) -> Option<ClientId> {
        self.user_to_client.get(&user_id).map(|r| *r)
    }

    /// The endpoint currently on file for `user_id`, if one has been learned.
    pub fn endpoint_for_user(&self, user_id: UserId) -> Option<SocketAddr> {
        self.user_to_endpoint.get(&user_id).and_then(|r| *r)
    }

    /// Removes all three mappings for a client id. Returns the owning user.
    pub fn unregister_by_client_id(&self, client_id: ClientId) -> Option<UserId> {
        let (_, user_id) = self.client_to_user.remove(&client_id)?;
        self.user_to_client.remove(&user_id);
        self.user_to_endpoint.remove(&user_id);
        tracing::info!(user_id = %user_id, client_id = %client_id, "udp client id unregistered");
        Some(user_id)
    }

    /// Removes all three mappings for a user. Returns the client id that was
    /// freed.
    pub fn unregister_by_user_id(&self, user_id: UserId) -> Option<ClientId> {
        let (_, client_id) = self.user_to_client.remove(&user_id)?;
        self.client_to_user.remove(&client_id);
        self.user_to_endpoint.remove(&user_id);
        tracing::info!(user_id = %user_id, client_id = %client_id, "udp client id unregistered");
        Some(client_id)
    }
}

impl Default for UdpEndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn allocate_assigns_a_fresh_id_each_time() {
        let registry = UdpEndpointRegistry::new();
        let a = registry.allocate(UserId::new());
        let b = registry.allocate(UserId::new());
        assert_ne!(a, b);
    }

    #[test]
    fn both_directions_resolve_after_allocate() {
        let registry = UdpEndpointRegistry::new();
        let user = UserId::new();
        let client_id = registry.allocate(user);

        assert_eq!(registry.user_id_for_client(client_id), Some(user));
        assert_eq!(registry.client_id_for_user(user), Some(client_id));
        assert_eq!(registry.endpoint_for_user(user), None);
    }

    #[test]
    fn record_endpoint_binds_address() {
        let registry = UdpEndpointRegistry::new();
        let user = UserId::new();
        let client_id = registry.allocate(user);

        let bound_user = registry.record_endpoint(client_id, endpoint(9000));
        assert_eq!(bound_user, Some(user));
        assert_eq!(registry.endpoint_for_user(user), Some(endpoint(9000)));
    }

    #[test]
    fn record_endpoint_rebinds_on_port_change() {
        let registry = UdpEndpointRegistry::new();
        let user = UserId::new();
        let client_id = registry.allocate(user);

        registry.record_endpoint(client_id, endpoint(9000));
        registry.record_endpoint(client_id, endpoint(9001));
        assert_eq!(registry.endpoint_for_user(user), Some(endpoint(9001)));
    }

    #[test]
    fn record_endpoint_for_unknown_client_is_none() {
        let registry = UdpEndpointRegistry::new();
        assert_eq!(registry.record_endpoint(ClientId(999), endpoint(1)), None);
    }

    #[test]
    fn unregister_by_client_id_clears_all_directions() {
        let registry = UdpEndpointRegistry::new();
        let user = UserId::new();
        let client_id = registry.allocate(user);
        registry.record_endpoint(client_id, endpoint(9000));

        let removed = registry.unregister_by_client_id(client_id);
        assert_eq!(removed, Some(user));
        assert_eq!(registry.user_id_for_client(client_id), None);
        assert_eq!(registry.client_id_for_user(user), None);
        assert_eq!(registry.endpoint_for_user(user), None);
    }

    #[test]
    fn unregister_by_user_id_clears_all_directions() {
        let registry = UdpEndpointRegistry::new();
        let user = UserId::new();
        let client_id = registry.allocate(user);
        registry.record_endpoint(client_id, endpoint(9000));

        let removed = registry.unregister_by_user_id(user);
        assert_eq!(removed, Some(client_id));
        assert_eq!(registry.user_id_for_client(client_id), None);
        assert_eq!(registry.endpoint_for_user(user), None);
    }

    #[test]
    fn allocation_skips_occupied_ids_after_wraparound() {
        let registry = UdpEndpointRegistry::new();
        registry.next_id.store(u32::MAX, Ordering::Relaxed);
        let first = registry.allocate(UserId::new());
        assert_eq!(first, ClientId(u32::MAX));

        // Next allocation wraps to 0, which is unoccupied, so it succeeds.
        let second = registry.allocate(UserId::new());
        assert_eq!(second, ClientId(0));
    }
}
