//! SQLite implementation of `UserRepository`

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{NewUser, UserRecord};
use crate::repository::UserRepository;
use crate::sqlite::pool::SqliteDb;
use crate::error::DbResult;

impl UserRepository for SqliteDb {
    async fn create(&self, data: NewUser<'_>) -> DbResult<UserRecord> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let role = if data.is_admin { "admin" } else { "user" };

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id_str)
        .bind(data.username)
        .bind(data.password_hash)
        .bind(role)
        .bind(&now_str)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE") || msg.contains("unique") {
                DbError::Uniqueness(format!("username '{}' already taken", data.username))
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(UserRecord {
            id,
            username: data.username.to_string(),
            password_hash: data.password_hash.to_string(),
            is_admin: data.is_admin,
            created_at: now,
            last_login: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role, created_at, last_login FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn get_by_username(&self, username: &str) -> DbResult<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role, created_at, last_login FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn list(&self) -> DbResult<Vec<UserRecord>> {
        let rows = sqlx::query(
            "SELECT id, username, password_hash, role, created_at, last_login FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn update_last_login(&self, id: Uuid) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> DbResult<UserRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DbError::internal(format!("invalid user uuid '{id_str}': {e}")))?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| DbError::internal(format!("invalid created_at '{created_at_str}': {e}")))?
        .with_timezone(&Utc);

    let last_login: Option<String> = row.try_get("last_login")?;
    let last_login = last_login
        .as_deref()
        .map(|s| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DbError::internal(format!("invalid last_login '{s}': {e}")))
        })
        .transpose()?;

    let role: String = row.try_get("role")?;

    Ok(UserRecord {
        id,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        is_admin: role == "admin",
        created_at,
        last_login,
    })
}
