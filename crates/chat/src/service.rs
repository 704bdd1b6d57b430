//! Message pipeline: sanitize, seal, persist, page (§4.3, §4.8)

use std::sync::Arc;

use uuid::Uuid;
use whispr_db::{
    models::{NewMessage, MessageRecord},
    repository::MessageRepository,
};

use crate::{
    crypto::MessageCipher,
    error::{ChatError, ChatResult},
    types::{HistoryRequest, MessageView},
};

/// Content is capped at this many code units after trimming; empty content
/// is rejected.
pub const MAX_CONTENT_LEN: usize = 4096;
pub const MIN_HISTORY_LIMIT: i64 = 1;
pub const MAX_HISTORY_LIMIT: i64 = 500;
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Strips control characters below U+0020 (keeping tab, CR, LF), trims,
/// and enforces the length cap. Rejects content that is empty afterward.
pub fn sanitize_content(raw: &str) -> ChatResult<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c >= '\u{0020}' || matches!(c, '\t' | '\r' | '\n'))
        .collect();
    let trimmed = cleaned.trim();

    if trimmed.is_empty() {
        return Err(ChatError::InvalidContent("message content is empty".into()));
    }
    if trimmed.chars().count() > MAX_CONTENT_LEN {
        return Err(ChatError::InvalidContent(format!(
            "message too long: {} code units (maximum {MAX_CONTENT_LEN})",
            trimmed.chars().count()
        )));
    }

    Ok(trimmed.to_string())
}

pub struct ChatService<R: MessageRepository> {
    repo: Arc<R>,
    cipher: MessageCipher,
}

impl<R: MessageRepository> ChatService<R> {
    pub fn new(repo: Arc<R>, cipher: MessageCipher) -> Arc<Self> {
        Arc::new(Self { repo, cipher })
    }

    /// Sanitizes, seals and persists a message. Channel-type and ACL checks
    /// happen in the signaling handler, which owns the channel manager and
    /// permission resolver this service doesn't depend on.
    pub async fn send_message(&self, channel_id: Uuid, sender_id: Uuid, content: &str) -> ChatResult<MessageView> {
        let clean = sanitize_content(content)?;
        let sealed = self.cipher.seal(&clean)?;

        let record = self.repo.create(NewMessage { channel_id, sender_id, content: &sealed }).await?;
        self.to_view(record)
    }

    pub async fn edit_message(&self, message_id: Uuid, sender_id: Uuid, new_content: &str) -> ChatResult<MessageView> {
        let clean = sanitize_content(new_content)?;

        let existing = self.load(message_id).await?;
        if existing.sender_id != sender_id {
            return Err(ChatError::Forbidden("only the author can edit this message".into()));
        }

        let sealed = self.cipher.seal(&clean)?;
        let record = self.repo.update_content(message_id, &sealed).await?;
        self.to_view(record)
    }

    /// Sender or admin may delete (§4.3).
    pub async fn delete_message(&self, message_id: Uuid, requester_id: Uuid, requester_is_admin: bool) -> ChatResult<()> {
        let existing = self.load(message_id).await?;
        if existing.sender_id != requester_id && !requester_is_admin {
            return Err(ChatError::Forbidden("only the author or an admin can delete this message".into()));
        }

        let deleted = self.repo.delete(message_id).await?;
        if !deleted {
            return Err(ChatError::NotFound(message_id.to_string()));
        }
        Ok(())
    }

    pub async fn get_history(&self, request: HistoryRequest) -> ChatResult<Vec<MessageView>> {
        let limit = request.limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        let records = self.repo.history(request.channel_id, request.since, request.before, limit).await?;
        records.into_iter().map(|r| self.to_view(r)).collect()
    }

    async fn load(&self, message_id: Uuid) -> ChatResult<MessageRecord> {
        self.repo.get_by_id(message_id).await?.ok_or_else(|| ChatError::NotFound(message_id.to_string()))
    }

    fn to_view(&self, record: MessageRecord) -> ChatResult<MessageView> {
        Ok(MessageView {
            id: record.id,
            channel_id: record.channel_id,
            sender_id: record.sender_id,
            content: self.cipher.open(&record.content)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use whispr_db::DbResult;

    #[derive(Default)]
    struct FakeMessageRepo {
        messages: Mutex<Vec<MessageRecord>>,
    }

    impl MessageRepository for FakeMessageRepo {
        async fn create(&self, data: NewMessage<'_>) -> DbResult<MessageRecord> {
            let record = MessageRecord {
                id: Uuid::new_v4(),
                channel_id: data.channel_id,
                sender_id: data.sender_id,
                content: data.content.to_string(),
                created_at: Utc::now(),
                updated_at: None,
            };
            self.messages.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn get_by_id(&self, id: Uuid) -> DbResult<Option<MessageRecord>> {
            Ok(self.messages.lock().unwrap().iter().find(|m| m.id == id).cloned())
        }

        async fn history(
            &self,
            channel_id: Uuid,
            _since: Option<chrono::DateTime<Utc>>,
            _before: Option<chrono::DateTime<Utc>>,
            limit: i64,
        ) -> DbResult<Vec<MessageRecord>> {
            let messages = self.messages.lock().unwrap();
            Ok(messages.iter().filter(|m| m.channel_id == channel_id).take(limit as usize).cloned().collect())
        }

        async fn update_content(&self, id: Uuid, content: &str) -> DbResult<MessageRecord> {
            let mut messages = self.messages.lock().unwrap();
            let record = messages.iter_mut().find(|m| m.id == id).expect("message exists");
            record.content = content.to_string();
            record.updated_at = Some(Utc::now());
            Ok(record.clone())
        }

        async fn delete(&self, id: Uuid) -> DbResult<bool> {
            let mut messages = self.messages.lock().unwrap();
            let before = messages.len();
            messages.retain(|m| m.id != id);
            Ok(messages.len() < before)
        }
    }

    fn service() -> Arc<ChatService<FakeMessageRepo>> {
        ChatService::new(Arc::new(FakeMessageRepo::default()), MessageCipher::DevBypass)
    }

    #[test]
    fn sanitize_strips_control_chars_and_trims() {
        let cleaned = sanitize_content("  hi\x01 there\n  ").unwrap();
        assert_eq!(cleaned, "hi there");
    }

    #[test]
    fn sanitize_rejects_empty_content() {
        assert!(matches!(sanitize_content("   \x01\x02  "), Err(ChatError::InvalidContent(_))));
    }

    #[test]
    fn sanitize_accepts_4096_and_rejects_4097() {
        let ok = "a".repeat(MAX_CONTENT_LEN);
        assert!(sanitize_content(&ok).is_ok());

        let too_long = "a".repeat(MAX_CONTENT_LEN + 1);
        assert!(matches!(sanitize_content(&too_long), Err(ChatError::InvalidContent(_))));
    }

    #[tokio::test]
    async fn send_and_read_back_message() {
        let service = service();
        let channel_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();

        let sent = service.send_message(channel_id, sender_id, "hello").await.unwrap();
        assert_eq!(sent.content, "hello");

        let history = service
            .get_history(HistoryRequest { channel_id, since: None, before: None, limit: 50 })
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hello");
    }

    #[tokio::test]
    async fn edit_requires_sender_identity_match() {
        let service = service();
        let channel_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        let sent = service.send_message(channel_id, sender_id, "hello").await.unwrap();
        let result = service.edit_message(sent.id, other_id, "edited").await;
        assert!(matches!(result, Err(ChatError::Forbidden(_))));

        let edited = service.edit_message(sent.id, sender_id, "edited").await.unwrap();
        assert_eq!(edited.content, "edited");
    }

    #[tokio::test]
    async fn delete_allows_sender_or_admin() {
        let service = service();
        let channel_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        let sent = service.send_message(channel_id, sender_id, "hello").await.unwrap();
        let result = service.delete_message(sent.id, other_id, false).await;
        assert!(matches!(result, Err(ChatError::Forbidden(_))));

        service.delete_message(sent.id, other_id, true).await.unwrap();
        assert!(matches!(service.load(sent.id).await, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn history_limit_is_clamped() {
        let service = service();
        let channel_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        for i in 0..3 {
            service.send_message(channel_id, sender_id, &format!("msg {i}")).await.unwrap();
        }

        let history = service
            .get_history(HistoryRequest { channel_id, since: None, before: None, limit: 0 })
            .await
            .unwrap();
        assert!(history.len() <= MAX_HISTORY_LIMIT as usize);
    }
}
