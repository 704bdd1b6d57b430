//! whispr-chat – text message pipeline (§4.3, §4.8)
//!
//! - `crypto`: AES-256-GCM at-rest sealing of message content
//! - `service`: sanitize, seal, persist, edit/delete, history paging
//!
//! Channel-type checks and ACL enforcement (`SendMessage` requires a Text
//! channel, and the sender must pass `can_access_channel`) live in the
//! signaling handler that calls this service — it already holds the
//! channel manager and permission resolver this crate doesn't depend on.

pub mod crypto;
pub mod error;
pub mod service;
pub mod types;

pub use crypto::MessageCipher;
pub use error::{ChatError, ChatResult};
pub use service::{sanitize_content, ChatService};
pub use types::{HistoryRequest, MessageView};
