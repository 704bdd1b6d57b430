//! Workspace-wide error type
//!
//! Crate-specific errors (`AuthError`, `DbError`, ...) convert into this
//! enum at their boundary via `#[from]`. Handlers ultimately map this down
//! to one of the wire protocol's error code strings (§6/§7); see
//! `whispr_protocol::control::ErrorCode`.

use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, WhisprError>;

#[derive(Debug, Error)]
pub enum WhisprError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("disconnected: {0}")]
    Disconnected(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("session expired")]
    SessionExpired,

    #[error("already logged in from another session")]
    AlreadyLoggedIn,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("server full: maximum client count reached")]
    ServerFull,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("rate limited")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl WhisprError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a caller might reasonably retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_) | Self::Disconnected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_detail() {
        let e = WhisprError::Authentication("bad password".into());
        assert_eq!(e.to_string(), "authentication failed: bad password");
    }

    #[test]
    fn retryability_classification() {
        assert!(WhisprError::Timeout("x".into()).is_retryable());
        assert!(!WhisprError::AccessDenied("x".into()).is_retryable());
    }
}
