//! # Registry Connection Pool
//!
//! Opens the registry file (or a private in-memory database for tests) and
//! hands out repositories bound to the pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DbConfig::new("registry.db")          DbConfig::in_memory()            │
//! │       │  Location::File                     │  Location::Memory         │
//! │       │  WAL, create if missing             │  one connection, never    │
//! │       │  pool_size connections              │  recycled (the database   │
//! │       │                                     │  dies with it)            │
//! │       └──────────────┬──────────────────────┘                           │
//! │                      ▼                                                  │
//! │        foreign_keys = ON, synchronous = NORMAL, busy_timeout            │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │        Database { SqlitePool } ──► migrations ──► repositories          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Several stations may open the same file. SQLite serializes their writers;
//! `busy_timeout` makes a writer queue behind the lock instead of failing
//! straight away, and WAL lets the redeemed feed read while someone writes.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::redemption::RedemptionRepository;
use crate::repository::valid_token::ValidTokenRepository;

/// Where the registry lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

/// Registry connection settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("/srv/event/registry.db")
///     .pool_size(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: Location,

    /// Connections in the pool. Default: 4 (1 for in-memory)
    pub pool_size: u32,

    /// How long to wait for a free pooled connection. Default: 5s
    pub acquire_timeout: Duration,

    /// How long a writer waits on a locked file. Default: 5s
    pub busy_timeout: Duration,

    /// Apply pending migrations when opening. Default: true
    pub migrate: bool,
}

impl DbConfig {
    /// A registry stored in `path`, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: Location::File(path.into()),
            pool_size: 4,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A private registry that lives as long as the returned `Database`.
    pub fn in_memory() -> Self {
        DbConfig {
            location: Location::Memory,
            pool_size: 1,
            ..DbConfig::new(PathBuf::new())
        }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.max(1);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Opens without touching the schema.
    pub fn without_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match &self.location {
            Location::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            Location::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::Unreachable(e.to_string()))?,
        };

        // Foreign keys are off by default in SQLite; they enforce
        // redemptions ⊆ valid_tokens.
        Ok(options
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.pool_size)
            .acquire_timeout(self.acquire_timeout);

        match self.location {
            Location::File(_) => options
                .min_connections(1)
                .idle_timeout(Some(Duration::from_secs(600))),
            Location::Memory => options
                .min_connections(self.pool_size)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }
}

/// Handle to an open registry. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the registry and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match &config.location {
            Location::File(path) => info!(path = %path.display(), "Opening registry"),
            Location::Memory => info!("Opening in-memory registry"),
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Busy => DbError::Busy,
                other => DbError::Unreachable(other.to_string()),
            })?;
        debug!(pool_size = config.pool_size, "Registry pool ready");

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn valid_tokens(&self) -> ValidTokenRepository {
        ValidTokenRepository::new(self.pool.clone())
    }

    pub fn redemptions(&self) -> RedemptionRepository {
        RedemptionRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        debug!("Closing registry pool");
        self.pool.close().await;
    }

    /// True if a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_registry_opens_and_closes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_file_registry_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        assert!(!path.exists());

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(db.health_check().await);
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn test_without_migrations_leaves_schema_empty() {
        let db = Database::new(DbConfig::in_memory().without_migrations())
            .await
            .unwrap();
        assert!(db.valid_tokens().count().await.is_err());
    }

    #[test]
    fn test_builder() {
        let config = DbConfig::new("/tmp/registry.db")
            .pool_size(0)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.pool_size, 1);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.location, Location::File(PathBuf::from("/tmp/registry.db")));
        assert_eq!(DbConfig::in_memory().location, Location::Memory);
    }
}
