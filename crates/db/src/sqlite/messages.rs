//! SQLite implementation of `MessageRepository`

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{MessageRecord, NewMessage};
use crate::repository::MessageRepository;
use crate::sqlite::pool::SqliteDb;
use crate::error::DbResult;

impl MessageRepository for SqliteDb {
    async fn create(&self, data: NewMessage<'_>) -> DbResult<MessageRecord> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let ticks = now.timestamp_millis();

        sqlx::query(
            "INSERT INTO messages (id, channel_id, sender_id, content, created_at, created_at_ticks)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id_str)
        .bind(data.channel_id.to_string())
        .bind(data.sender_id.to_string())
        .bind(data.content)
        .bind(&now_str)
        .bind(ticks)
        .execute(&self.pool)
        .await?;

        Ok(MessageRecord {
            id,
            channel_id: data.channel_id,
            sender_id: data.sender_id,
            content: data.content.to_string(),
            created_at: now,
            updated_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<MessageRecord>> {
        let row = sqlx::query(
            "SELECT id, channel_id, sender_id, content, created_at, updated_at FROM messages WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_message(&r)).transpose()
    }

    async fn history(
        &self,
        channel_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
        before: Option<chrono::DateTime<chrono::Utc>>,
        limit: i64,
    ) -> DbResult<Vec<MessageRecord>> {
        let since_ticks = since.map(|d| d.timestamp_millis()).unwrap_or(i64::MIN);
        let before_ticks = before.map(|d| d.timestamp_millis()).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            "SELECT id, channel_id, sender_id, content, created_at, updated_at FROM messages
             WHERE channel_id = ? AND created_at_ticks >= ? AND created_at_ticks < ?
             ORDER BY created_at_ticks DESC
             LIMIT ?",
        )
        .bind(channel_id.to_string())
        .bind(since_ticks)
        .bind(before_ticks)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<MessageRecord> = rows.iter().map(row_to_message).collect::<DbResult<_>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn update_content(&self, id: Uuid, content: &str) -> DbResult<MessageRecord> {
        let now_str = Utc::now().to_rfc3339();
        let affected = sqlx::query("UPDATE messages SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(&now_str)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::not_found(format!("message {id}")));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::internal("message vanished after update"))
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> DbResult<MessageRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let channel_id_str: String = row.try_get("channel_id")?;
    let sender_id_str: String = row.try_get("sender_id")?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| DbError::internal(format!("invalid created_at '{created_at_str}': {e}")))?
        .with_timezone(&Utc);

    let updated_at: Option<String> = row.try_get("updated_at")?;
    let updated_at = updated_at
        .as_deref()
        .map(|s| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DbError::internal(format!("invalid updated_at '{s}': {e}")))
        })
        .transpose()?;

    Ok(MessageRecord {
        id: Uuid::parse_str(&id_str).map_err(|e| DbError::internal(format!("invalid message uuid: {e}")))?,
        channel_id: Uuid::parse_str(&channel_id_str)
            .map_err(|e| DbError::internal(format!("invalid channel uuid: {e}")))?,
        sender_id: Uuid::parse_str(&sender_id_str)
            .map_err(|e| DbError::internal(format!("invalid sender uuid: {e}")))?,
        content: row.try_get("content")?,
        created_at,
        updated_at,
    })
}
