//! Signaling errors, and the mapping down to wire-level [`ErrorCode`]s (§7)
//!
//! "Repository failures surface as logged errors and a generic
//! `create_failed`/`access_denied` to the client; the server never exposes
//! internal exception text." [`SignalingError::to_error_code`] is the single
//! choke point that enforces that: every handler returns a `SignalingError`,
//! and only [`to_error_code`](SignalingError::to_error_code)'s match decides
//! what string (if any) reaches the socket.

use thiserror::Error;
use whispr_auth::AuthError;
use whispr_chat::ChatError;
use whispr_channels::ChannelError;
use whispr_db::DbError;
use whispr_protocol::control::ErrorCode;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("connection closed")]
    Disconnected,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not in a room")]
    NotInRoom,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limited")]
    RateLimited,

    #[error("send failed, write side closed")]
    SendFailed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl SignalingError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Maps an internal error to the `ErrorCode` sent to the client.
    /// Database/internal failures never leak their message text — only the
    /// generic code crosses the wire; the detail goes to the log via the
    /// `tracing::error!` the caller emits alongside this.
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            Self::Auth(AuthError::AlreadyLoggedIn) | Self::AlreadyLoggedIn => ErrorCode::AlreadyLoggedIn,
            Self::Auth(AuthError::InvalidCredentials) => ErrorCode::Unauthorized,
            Self::Auth(AuthError::SessionInvalid) | Self::Auth(AuthError::SessionExpired) => ErrorCode::InvalidToken,
            Self::Auth(AuthError::AccessDenied(_)) => ErrorCode::AccessDenied,
            Self::Auth(_) => ErrorCode::Unauthorized,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::AccessDenied(_) => ErrorCode::AccessDenied,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::NotFound(_) => ErrorCode::NotInRoom,
            Self::Channel(ChannelError::CapacityReached(_)) => ErrorCode::CreateFailed,
            Self::Channel(ChannelError::InvalidName(_, _)) => ErrorCode::InvalidPayload,
            Self::Chat(ChatError::InvalidContent(_)) => ErrorCode::InvalidPayload,
            Self::Chat(ChatError::Forbidden(_)) => ErrorCode::AccessDenied,
            Self::Chat(ChatError::NotFound(_)) => ErrorCode::NotInRoom,
            // Repository/internal failures never leak detail; the client
            // sees the same generic denial §7 names for this case.
            Self::Chat(_) | Self::Database(_) | Self::Disconnected | Self::SendFailed | Self::Io(_) | Self::Internal(_) => {
                ErrorCode::AccessDenied
            }
            Self::RateLimited => ErrorCode::RateLimited,
            Self::Protocol(_) => ErrorCode::InvalidMessage,
        }
    }
}

pub type SignalingResult<T> = Result<T, SignalingError>;
