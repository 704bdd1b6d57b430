//! Lightweight domain events, used for structured logging and for the
//! signaling crate's internal bookkeeping. These are not part of the wire
//! protocol (see `whispr-protocol` for that) — they exist purely as an
//! internal vocabulary shared across crates.

use crate::types::{ChannelId, ClientId, UserId};
use serde::{Deserialize, Serialize};

/// System-wide events useful for logging and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WhisprEvent {
    UserConnected { user_id: UserId },
    UserDisconnected { user_id: UserId, reason: String },
    ChannelJoined { user_id: UserId, channel_id: ChannelId },
    ChannelLeft { user_id: UserId, channel_id: ChannelId },
    UdpRegistered { user_id: UserId, client_id: ClientId },
    PermissionChanged { user_id: UserId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_json() {
        let event = WhisprEvent::UserConnected {
            user_id: UserId::new(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let _: WhisprEvent = serde_json::from_str(&json).unwrap();
    }
}
