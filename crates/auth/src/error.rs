//! Error types for the auth/permission service

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    PasswordHashing(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("already logged in from another session")]
    AlreadyLoggedIn,

    #[error("session not found or expired")]
    SessionInvalid,

    #[error("session expired")]
    SessionExpired,

    #[error("access denied: permission '{0}' not granted")]
    AccessDenied(String),

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] whispr_db::DbError),

    #[error("internal auth error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
