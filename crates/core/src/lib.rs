//! whispr-core – shared types, events and the workspace-wide error type
//!
//! Every other Whispr crate depends on this one for id newtypes and the
//! `WhisprError` enum.

pub mod error;
pub mod event;
pub mod types;

pub use error::{Result, WhisprError};
pub use types::{ChannelId, ChannelType, ClientId, MessageId, RoleId, ServerId, UserId, UserRole};
