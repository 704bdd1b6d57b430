//! Error types for the text message pipeline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message content invalid: {0}")]
    InvalidContent(String),

    #[error("message not found: {0}")]
    NotFound(String),

    #[error("not permitted: {0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(#[from] whispr_db::DbError),

    #[error("encryption error: {0}")]
    Crypto(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
