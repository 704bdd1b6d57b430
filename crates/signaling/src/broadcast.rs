//! Event broadcaster (§4.2)
//!
//! Holds the outbound mailbox for every registered connection and the
//! fan-out helpers handlers call after a mutation: to one user, to a
//! channel's roster, or to every connected user who independently passes
//! an ACL check. Channel membership itself is not tracked here — see
//! [`crate::presence`] — so fan-out-by-channel takes the recipient list as
//! an argument instead of looking it up internally.

use dashmap::DashMap;
use tokio::sync::mpsc;
use whispr_core::types::UserId;
use whispr_protocol::control::ControlMessage;

/// Registered connections' receive-side channel capacity. A slow client
/// that can't keep up gets dropped rather than unbounded memory growth.
const MAILBOX_CAPACITY: usize = 64;

struct ClientSender {
    tx: mpsc::Sender<ControlMessage>,
}

impl ClientSender {
    fn send(&self, message: &ControlMessage) -> bool {
        match self.tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("client mailbox full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Default)]
pub struct EventBroadcaster {
    clients: DashMap<UserId, ClientSender>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self { clients: DashMap::new() }
    }

    /// Registers `user_id`'s outbound mailbox and returns the receive side
    /// for the connection's forwarding task to drain.
    pub fn register(&self, user_id: UserId) -> mpsc::Receiver<ControlMessage> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        self.clients.insert(user_id, ClientSender { tx });
        rx
    }

    pub fn unregister(&self, user_id: UserId) {
        self.clients.remove(&user_id);
    }

    pub fn is_registered(&self, user_id: UserId) -> bool {
        self.clients.contains_key(&user_id)
    }

    pub fn send_to_user(&self, user_id: UserId, message: &ControlMessage) -> bool {
        match self.clients.get(&user_id) {
            Some(sender) => sender.send(message),
            None => false,
        }
    }

    /// Sends to every id in `user_ids` other than `exclude`. Returns how
    /// many actually received it.
    pub fn send_to_many(&self, user_ids: &[UserId], message: &ControlMessage, exclude: Option<UserId>) -> usize {
        user_ids
            .iter()
            .filter(|id| Some(**id) != exclude)
            .filter(|id| self.send_to_user(**id, message))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whispr_protocol::control::ControlPayload;

    fn ping() -> ControlMessage {
        ControlMessage::ping(1)
    }

    #[tokio::test]
    async fn send_to_registered_user_reaches_the_mailbox() {
        let broadcaster = EventBroadcaster::new();
        let user = UserId::new();
        let mut rx = broadcaster.register(user);

        assert!(broadcaster.send_to_user(user, &ping()));
        let received = rx.recv().await.unwrap();
        assert!(matches!(received.payload, ControlPayload::Ping));
    }

    #[tokio::test]
    async fn send_to_unregistered_user_is_false() {
        let broadcaster = EventBroadcaster::new();
        assert!(!broadcaster.send_to_user(UserId::new(), &ping()));
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let broadcaster = EventBroadcaster::new();
        let user = UserId::new();
        let _rx = broadcaster.register(user);
        broadcaster.unregister(user);
        assert!(!broadcaster.send_to_user(user, &ping()));
    }

    #[tokio::test]
    async fn send_to_many_excludes_one_and_counts_delivered() {
        let broadcaster = EventBroadcaster::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let carol = UserId::new();
        let mut alice_rx = broadcaster.register(alice);
        let mut bob_rx = broadcaster.register(bob);

        let delivered = broadcaster.send_to_many(&[alice, bob, carol], &ping(), Some(bob));
        assert_eq!(delivered, 1);
        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_err());
    }
}
