//! # Registry Store Errors
//!
//! What can go wrong between a station and the shared SQLite file.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  sqlx::Error                                                           │
//! │       │                                                                 │
//! │       ├── "database is locked" / pool timeout ──► Busy         ⟳      │
//! │       ├── io / pool closed / bad path ──────────► Unreachable  ⟳      │
//! │       ├── "FOREIGN KEY constraint failed" ──────► ForeignKeyViolation  │
//! │       ├── "UNIQUE constraint failed: t.c" ──────► DuplicateKey         │
//! │       └── anything else ────────────────────────► Query / Internal     │
//! │                                                                         │
//! │  ⟳ = the store is unavailable, not refusing; gatepass-sync turns        │
//! │      these into a retryable RegistryUnavailable                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The database file could not be opened or the pool is closed.
    ///
    /// ## When This Occurs
    /// - Database path is not writable
    /// - Shared volume went away mid-event
    #[error("Registry store unreachable: {0}")]
    Unreachable(String),

    /// Every connection was busy, or another writer held the file lock past
    /// the busy timeout.
    #[error("Registry store busy")]
    Busy,

    /// A write referenced a token that is not in `valid_tokens`.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A primary key or unique index rejected the write.
    #[error("Duplicate key in {key}")]
    DuplicateKey { key: String },

    /// A row expected to exist was missing.
    #[error("Missing {table} row for {key}")]
    MissingRow { table: String, key: String },

    /// Stored data could not be mapped back to domain types.
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: String, reason: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    /// SQLite rejected the statement for another reason.
    #[error("Query rejected: {0}")]
    Query(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn missing(table: impl Into<String>, key: impl Into<String>) -> Self {
        DbError::MissingRow {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn corrupt(table: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::CorruptRow {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// True when the store could not be reached or stayed busy, as opposed
    /// to rejecting the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DbError::Unreachable(_) | DbError::Busy | DbError::Internal(_)
        )
    }

    /// Maps a SQLite error message onto a variant.
    fn from_sqlite_message(msg: &str) -> Self {
        if let Some(key) = msg.strip_prefix("UNIQUE constraint failed: ") {
            DbError::DuplicateKey {
                key: key.to_string(),
            }
        } else if msg.contains("FOREIGN KEY constraint failed") {
            DbError::ForeignKeyViolation {
                message: msg.to_string(),
            }
        } else if msg.contains("database is locked") || msg.contains("database is busy") {
            DbError::Busy
        } else {
            DbError::Query(msg.to_string())
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::from_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::Busy,
            sqlx::Error::PoolClosed => DbError::Unreachable("connection pool closed".into()),
            sqlx::Error::Io(io) => DbError::Unreachable(io.to_string()),
            sqlx::Error::Configuration(e) => DbError::Unreachable(e.to_string()),
            sqlx::Error::RowNotFound => DbError::missing("registry", "query"),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(DbError::Busy.is_unavailable());
        assert!(DbError::Unreachable("gone".into()).is_unavailable());
        assert!(!DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".into()
        }
        .is_unavailable());
        assert!(!DbError::corrupt("redemptions", "bad token").is_unavailable());
    }

    #[test]
    fn test_sqlite_messages() {
        assert!(matches!(
            DbError::from_sqlite_message("UNIQUE constraint failed: redemptions.token"),
            DbError::DuplicateKey { ref key } if key == "redemptions.token"
        ));
        assert!(matches!(
            DbError::from_sqlite_message("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(matches!(
            DbError::from_sqlite_message("database is locked"),
            DbError::Busy
        ));
        assert!(matches!(
            DbError::from_sqlite_message("no such table: tickets"),
            DbError::Query(_)
        ));
    }

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::Busy));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::Unreachable(_)
        ));
    }
}
