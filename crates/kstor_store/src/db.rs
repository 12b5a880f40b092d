//! Database abstraction over SQLite via sqlx.

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{Sqlite, Transaction};

use crate::cache::EntityCache;
use crate::error::StoreError;

/// Central store handle. Cheap to clone (Arc internally).
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) cache: Arc<EntityCache>,
}

impl Store {
    /// Open (or create) the SQLite database at `db_path` and run pending
    /// migrations.
    ///
    /// Journal mode and foreign-key enforcement must be set on the
    /// connection options: SQLite rejects `journal_mode` changes inside a
    /// transaction, and sqlx wraps every migration in one.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts)
            .await
            .map_err(|e| StoreError::CantOpen(db_path.display().to_string(), e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        tracing::debug!(db = %db_path.display(), "database open, migrations applied");

        Ok(Self {
            pool,
            cache: Arc::new(EntityCache::new()),
        })
    }

    /// Begin a transaction; commit explicitly, roll back by dropping.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Check out a plain pooled connection (auto-commit statements).
    pub async fn acquire(
        &self,
    ) -> Result<sqlx::pool::PoolConnection<Sqlite>, StoreError> {
        Ok(self.pool.acquire().await?)
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }
}
