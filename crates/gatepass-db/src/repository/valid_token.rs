//! # Valid Token Repository
//!
//! The registry's copy of every token ever published. Publishing is a set
//! union: re-publishing a batch, or two batches sharing a token, inserts
//! nothing twice and never fails on the overlap.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use gatepass_core::Token;

/// Repository for the `valid_tokens` table.
#[derive(Debug, Clone)]
pub struct ValidTokenRepository {
    pool: SqlitePool,
}

impl ValidTokenRepository {
    /// Creates a new ValidTokenRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ValidTokenRepository { pool }
    }

    /// Unions `tokens` into the registry inside one transaction.
    ///
    /// ## Returns
    /// How many tokens were not already present.
    ///
    /// A failure part-way rolls the whole batch back, so a retry after an
    /// error starts from the same state.
    pub async fn publish(&self, batch_id: &str, tokens: &[Token]) -> DbResult<usize> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut added = 0usize;

        for token in tokens {
            let result = sqlx::query(
                r#"
                INSERT INTO valid_tokens (token, batch_id, published_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(token) DO NOTHING
                "#,
            )
            .bind(token.as_str())
            .bind(batch_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            added += result.rows_affected() as usize;
        }

        tx.commit().await?;

        info!(
            batch_id = %batch_id,
            submitted = tokens.len(),
            added,
            "Published valid tokens"
        );
        Ok(added)
    }

    /// Whether `token` has been published.
    pub async fn contains(&self, token: &Token) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM valid_tokens WHERE token = ?1")
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await?;

        debug!(token = %token, found = found.is_some(), "Validity lookup");
        Ok(found.is_some())
    }

    /// Every published token.
    pub async fn list_all(&self) -> DbResult<Vec<Token>> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT token FROM valid_tokens")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|raw| {
                Token::parse(raw).map_err(|e| DbError::corrupt("valid_tokens", e.to_string()))
            })
            .collect()
    }

    /// Number of published tokens.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM valid_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
