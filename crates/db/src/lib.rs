//! whispr-db – SQLite persistence
//!
//! Stores users, channels, the permission/role catalogue, per-channel ACL
//! overrides, and chat message history (§6). The repository traits in
//! `repository` decouple `whispr-auth`/`whispr-chat`/`whispr-channels` from
//! the SQLite implementation in `sqlite/`.
//!
//! ```no_run
//! use whispr_db::{SqliteDb, repository::DatabaseConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cfg = DatabaseConfig::from_path("whispr.db");
//!     let db = SqliteDb::open(&cfg).await.unwrap();
//! }
//! ```

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::{DbError, DbResult};
pub use repository::{
    ChannelRepository, DatabaseConfig, MessageRepository, PermissionRepository, UserRepository,
};
pub use sqlite::SqliteDb;
