//! Repository trait definitions
//!
//! The repository pattern decouples the service layer (`whispr-auth`,
//! `whispr-chat`, `whispr-channels`) from the concrete SQLite implementation
//! in `sqlite/`.

use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{
    ChannelRecord, ChannelRolePermissionRecord, ChannelUserPermissionRecord, MessageRecord,
    NewChannel, NewMessage, NewUser, PermissionRecord, RolePermissionRecord, RoleRecord,
    UserPermissionOverrideRecord, UserRecord, UserRoleRecord,
};

/// Connection configuration. `url` empty (or `"sqlite::memory:"`) opens an
/// in-memory database, per the server config's `database_path` knob (§6).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub sqlite_wal: bool,
}

impl DatabaseConfig {
    /// Builds a config from the server's `database_path` setting. An empty
    /// path means "in-memory, ephemeral" (used for seeded test runs).
    pub fn from_path(database_path: &str) -> Self {
        let url = if database_path.is_empty() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{database_path}")
        };
        Self {
            url,
            max_connections: 5,
            sqlite_wal: !database_path.is_empty(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::from_path("")
    }
}

#[allow(async_fn_in_trait)]
pub trait UserRepository: Send + Sync {
    async fn create(&self, data: NewUser<'_>) -> DbResult<UserRecord>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<UserRecord>>;
    async fn get_by_username(&self, username: &str) -> DbResult<Option<UserRecord>>;
    async fn list(&self) -> DbResult<Vec<UserRecord>>;
    async fn update_last_login(&self, id: Uuid) -> DbResult<()>;
}

#[allow(async_fn_in_trait)]
pub trait ChannelRepository: Send + Sync {
    async fn create(&self, data: NewChannel<'_>) -> DbResult<ChannelRecord>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<ChannelRecord>>;
    async fn list(&self) -> DbResult<Vec<ChannelRecord>>;
    async fn delete(&self, id: Uuid) -> DbResult<bool>;
}

/// Covers the permission catalogue, roles, role/user defaults and per-channel
/// ACL overrides — §4.5's resolution inputs.
#[allow(async_fn_in_trait)]
pub trait PermissionRepository: Send + Sync {
    async fn list_permissions(&self) -> DbResult<Vec<PermissionRecord>>;
    async fn get_permission_by_name(&self, name: &str) -> DbResult<Option<PermissionRecord>>;

    async fn list_roles(&self) -> DbResult<Vec<RoleRecord>>;
    async fn get_role_by_name(&self, name: &str) -> DbResult<Option<RoleRecord>>;
    async fn roles_for_user(&self, user_id: Uuid) -> DbResult<Vec<RoleRecord>>;
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> DbResult<()>;
    async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> DbResult<()>;

    async fn role_permission_states(&self, role_id: Uuid) -> DbResult<Vec<RolePermissionRecord>>;
    async fn set_role_permission(&self, role_id: Uuid, permission_id: Uuid, state: i64) -> DbResult<()>;

    async fn user_permission_overrides(&self, user_id: Uuid) -> DbResult<Vec<UserPermissionOverrideRecord>>;
    async fn set_user_permission(&self, user_id: Uuid, permission_id: Uuid, state: Option<i64>) -> DbResult<()>;

    async fn channel_role_states(&self, channel_id: Uuid) -> DbResult<Vec<ChannelRolePermissionRecord>>;
    async fn set_channel_role_permission(
        &self,
        channel_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
        state: Option<i64>,
    ) -> DbResult<()>;

    async fn channel_user_states(&self, channel_id: Uuid) -> DbResult<Vec<ChannelUserPermissionRecord>>;
    async fn set_channel_user_permission(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        permission_id: Uuid,
        state: Option<i64>,
    ) -> DbResult<()>;
}

#[allow(async_fn_in_trait)]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, data: NewMessage<'_>) -> DbResult<MessageRecord>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<MessageRecord>>;
    async fn history(
        &self,
        channel_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
        before: Option<chrono::DateTime<chrono::Utc>>,
        limit: i64,
    ) -> DbResult<Vec<MessageRecord>>;
    async fn update_content(&self, id: Uuid, content: &str) -> DbResult<MessageRecord>;
    async fn delete(&self, id: Uuid) -> DbResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_in_memory() {
        let cfg = DatabaseConfig::from_path("");
        assert!(cfg.is_in_memory());
        assert!(!cfg.sqlite_wal);
    }

    #[test]
    fn nonempty_path_is_file_backed() {
        let cfg = DatabaseConfig::from_path("/var/lib/whispr/whispr.db");
        assert!(!cfg.is_in_memory());
        assert!(cfg.sqlite_wal);
        assert_eq!(cfg.url, "sqlite:///var/lib/whispr/whispr.db");
    }
}
