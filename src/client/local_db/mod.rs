//! # Local Database Module
//!
//! The local cache behind the sync engine: a SQLite-backed key/value store of
//! JSON documents addressed by `(EntityKind, id)`.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool and schema management
//! - `cache.rs`: typed read, write and read-modify-write of entries
//! - `sync.rs`: the offline queue and connectivity fragments
//! - `trackables.rs`: trackable connections, aggregates and the activity feed
//!
//! The pool holds a single connection. Every read-modify-write runs in one
//! transaction on it, so concurrent updates from the drain loop, the deadline
//! scanner and callers are serialized.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use progress_sync::client::local_db::{ConnectionKey, LocalDatabase};
//!
//! # async fn run() -> progress_sync::client::error::Result<()> {
//! let db = LocalDatabase::in_memory().await?;
//! db.init_connection(&ConnectionKey::active_trackables("u1")).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod sync;
pub mod trackables;

pub use cache::{Audience, ConnectionKey, EntityKind, StoreKey};
pub use trackables::{ActivityConnection, TrackableConnection};

use crate::client::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Local cache connection manager
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Uses WAL mode. Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        tracing::debug!("[STORE] Opening local cache at {}", path.display());
        Self::connect(options).await
    }

    /// Open the database in the platform data directory
    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_path()).await
    }

    /// Private in-memory database, lost when dropped
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options).await
    }

    /// Platform-specific path of the database file
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("progress-sync");
        path.push("cache.db");
        path
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // An in-memory database lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;

        self.run_migrations().await
    }

    async fn run_migrations(&self) -> Result<()> {
        if self.schema_version().await? < 1 {
            self.apply_migration_1().await?;
        }
        Ok(())
    }

    /// Migration 1: initial schema
    async fn apply_migration_1(&self) -> Result<()> {
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (1, ?)")
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        tracing::info!("[STORE] Applied schema migration 1");
        Ok(())
    }

    /// Applied schema version
    pub async fn schema_version(&self) -> Result<i64> {
        let (version,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for the connection to be released
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Basic statistics for debugging
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let (entry_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&self.pool)
            .await?;

        let pending_operations = self.read_offline_queue().await?.len();

        Ok(DatabaseStats {
            entry_count: entry_count as u64,
            pending_operations: pending_operations as u64,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub entry_count: u64,
    pub pending_operations: u64,
}
