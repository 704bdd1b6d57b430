//! Public types for the text message pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A decrypted message, ready to serialize onto the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Paging request for `GetMessageHistory` (§4.3): either `since` or
/// `before` selects forward/reverse paging.
#[derive(Debug, Clone, Default)]
pub struct HistoryRequest {
    pub channel_id: Uuid,
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub limit: i64,
}
