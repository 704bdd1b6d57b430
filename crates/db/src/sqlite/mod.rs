//! SQLite implementations of the repository traits

pub mod channels;
pub mod messages;
pub mod permissions;
pub mod pool;
pub mod users;

pub use pool::SqliteDb;
