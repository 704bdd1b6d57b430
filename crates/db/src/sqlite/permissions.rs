//! SQLite implementation of `PermissionRepository`
//!
//! Covers the permission catalogue, roles, role/user server-wide defaults,
//! and the per-channel role/user ACL overrides that `whispr-auth`'s
//! permission service resolves (§4.5).

use uuid::Uuid;

use crate::models::{
    ChannelRolePermissionRecord, ChannelUserPermissionRecord, PermissionRecord,
    RolePermissionRecord, RoleRecord, UserPermissionOverrideRecord,
};
use crate::repository::PermissionRepository;
use crate::sqlite::pool::SqliteDb;
use crate::error::DbResult;

impl PermissionRepository for SqliteDb {
    async fn list_permissions(&self) -> DbResult<Vec<PermissionRecord>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, name, description FROM permissions ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, description)| {
                Ok(PermissionRecord {
                    id: parse_uuid(&id)?,
                    name,
                    description,
                })
            })
            .collect()
    }

    async fn get_permission_by_name(&self, name: &str) -> DbResult<Option<PermissionRecord>> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, name, description FROM permissions WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, name, description)| {
            Ok(PermissionRecord {
                id: parse_uuid(&id)?,
                name,
                description,
            })
        })
        .transpose()
    }

    async fn list_roles(&self) -> DbResult<Vec<RoleRecord>> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, name)| Ok(RoleRecord { id: parse_uuid(&id)?, name }))
            .collect()
    }

    async fn get_role_by_name(&self, name: &str) -> DbResult<Option<RoleRecord>> {
        let row = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(id, name)| Ok(RoleRecord { id: parse_uuid(&id)?, name })).transpose()
    }

    async fn roles_for_user(&self, user_id: Uuid) -> DbResult<Vec<RoleRecord>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT r.id, r.name FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = ?
             ORDER BY r.name",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name)| Ok(RoleRecord { id: parse_uuid(&id)?, name }))
            .collect()
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id.to_string())
            .bind(role_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> DbResult<()> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id.to_string())
            .bind(role_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn role_permission_states(&self, role_id: Uuid) -> DbResult<Vec<RolePermissionRecord>> {
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT role_id, permission_id, state FROM role_permissions WHERE role_id = ?",
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(role_id, permission_id, state)| {
                Ok(RolePermissionRecord {
                    role_id: parse_uuid(&role_id)?,
                    permission_id: parse_uuid(&permission_id)?,
                    state,
                })
            })
            .collect()
    }

    async fn set_role_permission(&self, role_id: Uuid, permission_id: Uuid, state: i64) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id, state) VALUES (?, ?, ?)
             ON CONFLICT(role_id, permission_id) DO UPDATE SET state = excluded.state",
        )
        .bind(role_id.to_string())
        .bind(permission_id.to_string())
        .bind(state)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_permission_overrides(&self, user_id: Uuid) -> DbResult<Vec<UserPermissionOverrideRecord>> {
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT user_id, permission_id, state FROM user_permissions WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(user_id, permission_id, state)| {
                Ok(UserPermissionOverrideRecord {
                    user_id: parse_uuid(&user_id)?,
                    permission_id: parse_uuid(&permission_id)?,
                    state,
                })
            })
            .collect()
    }

    async fn set_user_permission(&self, user_id: Uuid, permission_id: Uuid, state: Option<i64>) -> DbResult<()> {
        match state {
            Some(state) => {
                sqlx::query(
                    "INSERT INTO user_permissions (user_id, permission_id, state) VALUES (?, ?, ?)
                     ON CONFLICT(user_id, permission_id) DO UPDATE SET state = excluded.state",
                )
                .bind(user_id.to_string())
                .bind(permission_id.to_string())
                .bind(state)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM user_permissions WHERE user_id = ? AND permission_id = ?")
                    .bind(user_id.to_string())
                    .bind(permission_id.to_string())
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn channel_role_states(&self, channel_id: Uuid) -> DbResult<Vec<ChannelRolePermissionRecord>> {
        let rows = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT channel_id, role_id, permission_id, state FROM channel_role_permissions WHERE channel_id = ?",
        )
        .bind(channel_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(channel_id, role_id, permission_id, state)| {
                Ok(ChannelRolePermissionRecord {
                    channel_id: parse_uuid(&channel_id)?,
                    role_id: parse_uuid(&role_id)?,
                    permission_id: parse_uuid(&permission_id)?,
                    state,
                })
            })
            .collect()
    }

    async fn set_channel_role_permission(
        &self,
        channel_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
        state: Option<i64>,
    ) -> DbResult<()> {
        match state {
            Some(state) => {
                sqlx::query(
                    "INSERT INTO channel_role_permissions (channel_id, role_id, permission_id, state)
                     VALUES (?, ?, ?, ?)
                     ON CONFLICT(channel_id, role_id, permission_id) DO UPDATE SET state = excluded.state",
                )
                .bind(channel_id.to_string())
                .bind(role_id.to_string())
                .bind(permission_id.to_string())
                .bind(state)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM channel_role_permissions WHERE channel_id = ? AND role_id = ? AND permission_id = ?",
                )
                .bind(channel_id.to_string())
                .bind(role_id.to_string())
                .bind(permission_id.to_string())
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn channel_user_states(&self, channel_id: Uuid) -> DbResult<Vec<ChannelUserPermissionRecord>> {
        let rows = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT channel_id, user_id, permission_id, state FROM channel_user_permissions WHERE channel_id = ?",
        )
        .bind(channel_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(channel_id, user_id, permission_id, state)| {
                Ok(ChannelUserPermissionRecord {
                    channel_id: parse_uuid(&channel_id)?,
                    user_id: parse_uuid(&user_id)?,
                    permission_id: parse_uuid(&permission_id)?,
                    state,
                })
            })
            .collect()
    }

    async fn set_channel_user_permission(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        permission_id: Uuid,
        state: Option<i64>,
    ) -> DbResult<()> {
        match state {
            Some(state) => {
                sqlx::query(
                    "INSERT INTO channel_user_permissions (channel_id, user_id, permission_id, state)
                     VALUES (?, ?, ?, ?)
                     ON CONFLICT(channel_id, user_id, permission_id) DO UPDATE SET state = excluded.state",
                )
                .bind(channel_id.to_string())
                .bind(user_id.to_string())
                .bind(permission_id.to_string())
                .bind(state)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM channel_user_permissions WHERE channel_id = ? AND user_id = ? AND permission_id = ?",
                )
                .bind(channel_id.to_string())
                .bind(user_id.to_string())
                .bind(permission_id.to_string())
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}

fn parse_uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| crate::error::DbError::internal(format!("invalid uuid '{s}': {e}")))
}
