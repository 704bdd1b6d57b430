//! Database record types
//!
//! These are data transfer objects for the rows in `migrations/0001_init.sql`,
//! kept separate from the domain types in `whispr-core` and from the wire
//! types in `whispr-protocol`.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use whispr_core::ChannelType;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub is_admin: bool,
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelRecord {
    pub id: Uuid,
    pub name: String,
    pub channel_type: ChannelType,
    pub is_default: bool,
    pub key_material: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChannel<'a> {
    pub name: &'a str,
    pub channel_type: ChannelType,
    pub is_default: bool,
    pub key_material: Option<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Permissions, roles, ACLs
// ---------------------------------------------------------------------------

/// One entry in the permission catalogue (e.g. "create_channel", "send_message").
#[derive(Debug, Clone)]
pub struct PermissionRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct RoleRecord {
    pub id: Uuid,
    pub name: String,
}

/// A role's server-wide default state for a permission. 0=Allow, 1=Deny, 2=Neutral.
#[derive(Debug, Clone)]
pub struct RolePermissionRecord {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub state: i64,
}

#[derive(Debug, Clone)]
pub struct UserRoleRecord {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// A per-user override of a permission's server-wide default.
#[derive(Debug, Clone)]
pub struct UserPermissionOverrideRecord {
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub state: i64,
}

/// A role's per-channel override of a permission.
#[derive(Debug, Clone)]
pub struct ChannelRolePermissionRecord {
    pub channel_id: Uuid,
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub state: i64,
}

/// A user's per-channel override of a permission.
#[derive(Debug, Clone)]
pub struct ChannelUserPermissionRecord {
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub state: i64,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    /// Stored content — `"enc:" + base64` when encryption is enabled, plaintext otherwise.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub content: &'a str,
}
