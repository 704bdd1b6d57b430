//! SQLite implementation of `ChannelRepository`

use chrono::Utc;
use uuid::Uuid;
use whispr_core::ChannelType;

use crate::error::DbError;
use crate::models::{ChannelRecord, NewChannel};
use crate::repository::ChannelRepository;
use crate::sqlite::pool::SqliteDb;
use crate::error::DbResult;

impl ChannelRepository for SqliteDb {
    async fn create(&self, data: NewChannel<'_>) -> DbResult<ChannelRecord> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        sqlx::query(
            "INSERT INTO channels (id, name, type, is_default, key_material, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id_str)
        .bind(data.name)
        .bind(data.channel_type.as_db_int())
        .bind(data.is_default as i64)
        .bind(data.key_material.as_deref())
        .bind(&now_str)
        .execute(&self.pool)
        .await?;

        Ok(ChannelRecord {
            id,
            name: data.name.to_string(),
            channel_type: data.channel_type,
            is_default: data.is_default,
            key_material: data.key_material,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<ChannelRecord>> {
        let row = sqlx::query(
            "SELECT id, name, type, is_default, key_material, created_at FROM channels WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_channel(&r)).transpose()
    }

    async fn list(&self) -> DbResult<Vec<ChannelRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, type, is_default, key_material, created_at FROM channels ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_channel).collect()
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_channel(row: &sqlx::sqlite::SqliteRow) -> DbResult<ChannelRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DbError::internal(format!("invalid channel uuid '{id_str}': {e}")))?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| DbError::internal(format!("invalid created_at '{created_at_str}': {e}")))?
        .with_timezone(&Utc);

    let type_int: i64 = row.try_get("type")?;
    let channel_type = ChannelType::from_db_int(type_int)
        .ok_or_else(|| DbError::internal(format!("invalid channel type int {type_int}")))?;

    let is_default: i64 = row.try_get("is_default")?;

    Ok(ChannelRecord {
        id,
        name: row.try_get("name")?,
        channel_type,
        is_default: is_default != 0,
        key_material: row.try_get("key_material")?,
        created_at,
    })
}
