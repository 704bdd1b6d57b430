//! Shared identifier types for Whispr
//!
//! IDs use the newtype pattern so different kinds of identifiers can never
//! be confused for one another at compile time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Unique channel id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel:{}", self.0)
    }
}

/// Unique server id (single value per running instance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub Uuid);

impl ServerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "server:{}", self.0)
    }
}

/// Unique message id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "message:{}", self.0)
    }
}

/// Unique role id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub Uuid);

impl RoleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "role:{}", self.0)
    }
}

/// Server-assigned 32-bit identifier placed in every audio datagram header.
///
/// Unlike the other ids this is not a UUID: it must fit the 4-byte field in
/// the audio packet header (§4.1) and is allocated by the UDP endpoint
/// registry, not generated client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}

/// User role. Kept separate from the permission model's `Role` records: this
/// is the coarse built-in distinction the spec layers the `admin` permission
/// fallback on top of (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Voice or text channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Voice,
    Text,
}

impl ChannelType {
    pub fn as_db_int(&self) -> i64 {
        match self {
            Self::Voice => 0,
            Self::Text => 1,
        }
    }

    pub fn from_db_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Voice),
            1 => Some(Self::Text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_are_unique() {
        let a = UserId::new();
        let b = UserId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn channel_ids_are_unique() {
        let a = ChannelId::new();
        let b = ChannelId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn server_id_display() {
        let id = ServerId(Uuid::nil());
        assert!(id.to_string().starts_with("server:"));
    }

    #[test]
    fn ids_round_trip_through_json() {
        let uid = UserId::new();
        let json = serde_json::to_string(&uid).unwrap();
        let uid2: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);
    }

    #[test]
    fn channel_type_db_encoding_matches_spec() {
        assert_eq!(ChannelType::Voice.as_db_int(), 0);
        assert_eq!(ChannelType::Text.as_db_int(), 1);
        assert_eq!(ChannelType::from_db_int(0), Some(ChannelType::Voice));
        assert_eq!(ChannelType::from_db_int(1), Some(ChannelType::Text));
        assert_eq!(ChannelType::from_db_int(9), None);
    }
}
