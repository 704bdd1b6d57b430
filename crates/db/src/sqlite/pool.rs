//! SQLite connection pool, WAL mode, and embedded migrations

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::DbError;
use crate::repository::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct SqliteDb {
    pub(crate) pool: SqlitePool,
}

impl SqliteDb {
    /// Opens the pool and runs all pending migrations. `config.url` pointing
    /// at `sqlite::memory:` (an empty `database_path`, per §6) opens a fresh
    /// ephemeral database that disappears once the pool is dropped.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DbError> {
        let opts = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(if config.sqlite_wal {
                SqliteJournalMode::Wal
            } else {
                SqliteJournalMode::Delete
            })
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(if config.is_in_memory() { 1 } else { 0 })
            .connect_with(opts)
            .await?;

        info!(url = %config.url, wal = config.sqlite_wal, "opened sqlite pool");

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a scratch in-memory database, for tests.
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::open(&DatabaseConfig::from_path("")).await
    }
}
