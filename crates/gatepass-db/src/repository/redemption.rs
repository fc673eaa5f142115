//! # Redemption Repository
//!
//! First-redemption records and the single atomic write every station
//! races on.
//!
//! ## The Conditional Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Station A ──┐                                                          │
//! │              │   INSERT INTO redemptions … ON CONFLICT(token) DO NOTHING│
//! │  Station B ──┼──────────────────────────────►  SQLite write lock        │
//! │              │                                  (one writer at a time)  │
//! │  Station C ──┘                                                          │
//! │                                                                         │
//! │  rows_affected = 1  → FirstRedemption (this caller owns it)            │
//! │  rows_affected = 0  → read the winner's row                            │
//! │                         same scan_id? → FirstRedemption (a retry)      │
//! │                         otherwise     → AlreadyRedeemed(winner)        │
//! │  FOREIGN KEY failed → token was never published                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The insert is the only write. The follow-up read only ever sees a row
//! that can no longer change.
//!
//! ## Feed Cursor
//! Rows are never deleted, so `rowid` increases in commit order.
//! [`RedemptionRepository::list_since`] returns everything after a cursor,
//! which is how stations follow each other's redemptions.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use gatepass_core::{RedeemOutcome, Redemption, Token};

/// A redemption together with its position in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub seq: i64,
    pub redemption: Redemption,
}

#[derive(Debug, sqlx::FromRow)]
struct RedemptionRow {
    seq: i64,
    token: String,
    redeemed_at: DateTime<Utc>,
    station_id: String,
    scan_id: String,
}

impl RedemptionRow {
    fn into_entry(self) -> DbResult<FeedEntry> {
        let token =
            Token::parse(&self.token).map_err(|e| DbError::corrupt("redemptions", e.to_string()))?;
        Ok(FeedEntry {
            seq: self.seq,
            redemption: Redemption {
                token,
                redeemed_at: self.redeemed_at,
                station_id: self.station_id,
                scan_id: self.scan_id,
            },
        })
    }
}

/// Repository for the `redemptions` table.
#[derive(Debug, Clone)]
pub struct RedemptionRepository {
    pool: SqlitePool,
}

impl RedemptionRepository {
    /// Creates a new RedemptionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RedemptionRepository { pool }
    }

    /// Atomically records the first redemption of `token`.
    ///
    /// ## Arguments
    /// * `token` - The presented token (must already be published)
    /// * `station_id` - Station performing the check-in
    /// * `scan_id` - Decode event id; reusing it on retry makes the call idempotent
    /// * `at` - Redemption timestamp
    ///
    /// ## Errors
    /// - [`DbError::ForeignKeyViolation`] if `token` was never published
    /// - [`DbError::Busy`] if the file stayed locked past the busy timeout
    pub async fn try_redeem(
        &self,
        token: &Token,
        station_id: &str,
        scan_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<RedeemOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO redemptions (token, redeemed_at, station_id, scan_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(token) DO NOTHING
            "#,
        )
        .bind(token.as_str())
        .bind(at)
        .bind(station_id)
        .bind(scan_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(token = %token, station_id = %station_id, "First redemption");
            return Ok(RedeemOutcome::FirstRedemption(Redemption {
                token: token.clone(),
                redeemed_at: at,
                station_id: station_id.to_string(),
                scan_id: scan_id.to_string(),
            }));
        }

        let existing = self
            .get(token)
            .await?
            .ok_or_else(|| DbError::missing("redemptions", token.as_str()))?;

        if existing.scan_id == scan_id {
            debug!(token = %token, scan_id = %scan_id, "Retried redemption already committed");
            Ok(RedeemOutcome::FirstRedemption(existing))
        } else {
            warn!(
                token = %token,
                station_id = %station_id,
                redeemed_by = %existing.station_id,
                "Token already redeemed"
            );
            Ok(RedeemOutcome::AlreadyRedeemed(existing))
        }
    }

    /// Gets the redemption of `token`, if any.
    pub async fn get(&self, token: &Token) -> DbResult<Option<Redemption>> {
        let row = sqlx::query_as::<_, RedemptionRow>(
            r#"
            SELECT rowid AS seq, token, redeemed_at, station_id, scan_id
            FROM redemptions
            WHERE token = ?1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_entry().map(|e| e.redemption)).transpose()
    }

    /// Redemptions committed after `after_seq`, oldest first.
    ///
    /// ## Arguments
    /// * `after_seq` - Feed cursor; `0` returns everything
    /// * `limit` - Maximum entries to return
    pub async fn list_since(&self, after_seq: i64, limit: u32) -> DbResult<Vec<FeedEntry>> {
        let rows = sqlx::query_as::<_, RedemptionRow>(
            r#"
            SELECT rowid AS seq, token, redeemed_at, station_id, scan_id
            FROM redemptions
            WHERE rowid > ?1
            ORDER BY rowid ASC
            LIMIT ?2
            "#,
        )
        .bind(after_seq)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RedemptionRow::into_entry).collect()
    }

    /// Number of redeemed tokens.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM redemptions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn token(s: &str) -> Token {
        Token::parse(s).unwrap()
    }

    async fn seeded(raw: &[&str]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tokens: Vec<Token> = raw.iter().map(|s| token(s)).collect();
        db.valid_tokens().publish("batch", &tokens).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_first_then_already_redeemed() {
        let db = seeded(&["alice"]).await;
        let repo = db.redemptions();

        let first = repo
            .try_redeem(&token("alice"), "gate-a", "scan-1", Utc::now())
            .await
            .unwrap();
        assert!(first.is_first());

        let second = repo
            .try_redeem(&token("alice"), "gate-b", "scan-2", Utc::now())
            .await
            .unwrap();
        match second {
            RedeemOutcome::AlreadyRedeemed(existing) => {
                assert_eq!(existing.station_id, "gate-a");
                assert_eq!(existing.scan_id, "scan-1");
            }
            other => panic!("expected AlreadyRedeemed, got {other:?}"),
        }
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_scan_id_is_idempotent() {
        let db = seeded(&["alice"]).await;
        let repo = db.redemptions();

        repo.try_redeem(&token("alice"), "gate-a", "scan-1", Utc::now())
            .await
            .unwrap();
        let retry = repo
            .try_redeem(&token("alice"), "gate-a", "scan-1", Utc::now())
            .await
            .unwrap();

        assert!(retry.is_first());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unpublished_token_is_foreign_key_violation() {
        let db = seeded(&["alice"]).await;
        let err = db
            .redemptions()
            .try_redeem(&token("mallory"), "gate-a", "scan-1", Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert_eq!(db.redemptions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_since_follows_commit_order() {
        let db = seeded(&["a", "b", "c"]).await;
        let repo = db.redemptions();

        for (i, t) in ["b", "a", "c"].iter().enumerate() {
            repo.try_redeem(&token(t), "gate", &format!("scan-{i}"), Utc::now())
                .await
                .unwrap();
        }

        let all = repo.list_since(0, 100).await.unwrap();
        let order: Vec<&str> = all.iter().map(|e| e.redemption.token.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);

        let tail = repo.list_since(all[0].seq, 100).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert!(repo.list_since(all[2].seq, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_stations_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let first = Database::new(DbConfig::new(&path)).await.unwrap();
        first
            .valid_tokens()
            .publish("batch", &[token("contested")])
            .await
            .unwrap();
        let second = Database::new(DbConfig::new(&path)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = if i % 2 == 0 {
                first.redemptions()
            } else {
                second.redemptions()
            };
            handles.push(tokio::spawn(async move {
                repo.try_redeem(
                    &token("contested"),
                    &format!("gate-{i}"),
                    &format!("scan-{i}"),
                    Utc::now(),
                )
                .await
            }));
        }

        let outcomes: Vec<RedeemOutcome> = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let winners: Vec<&RedeemOutcome> = outcomes.iter().filter(|o| o.is_first()).collect();
        assert_eq!(winners.len(), 1);

        let winner = winners[0].redemption();
        for outcome in &outcomes {
            assert_eq!(outcome.redemption().scan_id, winner.scan_id);
        }
        assert_eq!(first.redemptions().count().await.unwrap(), 1);
    }
}
