//! # SQLite Registry
//!
//! [`RegistrySync`] over a SQLite file shared by every station. Atomicity
//! comes from the database (see `gatepass_db::RedemptionRepository`); this
//! layer adds the redeemed feed and maps store errors into [`SyncError`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::feed::{FeedHandle, RedeemedFeed};
use crate::registry::{RedeemedSnapshot, RegistrySync};
use gatepass_core::{RedeemOutcome, RedeemedTokenSet, Token, ValidTokenSet};
use gatepass_db::{Database, DbError};

const LOAD_PAGE_SIZE: u32 = 1000;

/// Registry backed by a shared SQLite database.
#[derive(Debug)]
pub struct SqliteRegistry {
    db: Database,
    redeemed_rx: watch::Receiver<RedeemedSnapshot>,
    feed: FeedHandle,
}

impl SqliteRegistry {
    /// Opens the registry and starts its redeemed feed.
    ///
    /// The first poll runs before this returns, so subscribers start from
    /// the current redeemed set.
    pub async fn open(db: Database, poll_interval: Duration) -> SyncResult<Self> {
        let (mut feed, handle, redeemed_rx) = RedeemedFeed::new(db.redemptions(), poll_interval);
        let initial = feed.poll_once().await?;
        tokio::spawn(feed.run());

        info!(redeemed = initial, "SQLite registry open");
        Ok(SqliteRegistry {
            db,
            redeemed_rx,
            feed: handle,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn feed(&self) -> &FeedHandle {
        &self.feed
    }

    /// Stops the feed task. The database pool stays open.
    pub async fn shutdown(&self) {
        if let Err(e) = self.feed.shutdown().await {
            error!(error = %e, "Failed to stop redeemed feed");
        }
    }
}

#[async_trait]
impl RegistrySync for SqliteRegistry {
    async fn publish_valid_tokens(&self, tokens: &[Token]) -> SyncResult<usize> {
        let batch_id = Uuid::new_v4().to_string();
        Ok(self.db.valid_tokens().publish(&batch_id, tokens).await?)
    }

    fn subscribe_redeemed(&self) -> watch::Receiver<RedeemedSnapshot> {
        self.redeemed_rx.clone()
    }

    async fn try_redeem(
        &self,
        token: &Token,
        at: DateTime<Utc>,
        station_id: &str,
        scan_id: &str,
    ) -> SyncResult<RedeemOutcome> {
        match self
            .db
            .redemptions()
            .try_redeem(token, station_id, scan_id, at)
            .await
        {
            Ok(outcome) => {
                if outcome.is_first() {
                    self.feed.nudge();
                }
                Ok(outcome)
            }
            Err(DbError::ForeignKeyViolation { .. }) => Err(SyncError::NotIssued {
                token: token.to_string(),
            }),
            Err(e) => {
                error!(token = %token, error = %e, "Redemption write failed");
                Err(e.into())
            }
        }
    }

    async fn is_valid(&self, token: &Token) -> SyncResult<bool> {
        Ok(self.db.valid_tokens().contains(token).await?)
    }

    async fn valid_tokens(&self) -> SyncResult<ValidTokenSet> {
        Ok(self.db.valid_tokens().list_all().await?.into_iter().collect())
    }

    async fn redeemed(&self) -> SyncResult<RedeemedTokenSet> {
        let repo = self.db.redemptions();
        let mut set = RedeemedTokenSet::new();
        let mut cursor = 0;
        loop {
            let page = repo.list_since(cursor, LOAD_PAGE_SIZE).await?;
            let fetched = page.len();
            for entry in page {
                cursor = entry.seq;
                set.try_insert(entry.redemption.token, entry.redemption.redeemed_at);
            }
            if fetched < LOAD_PAGE_SIZE as usize {
                return Ok(set);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_db::DbConfig;
    use std::path::Path;
    use std::sync::Arc;

    fn token(s: &str) -> Token {
        Token::parse(s).unwrap()
    }

    async fn station(path: &Path) -> SqliteRegistry {
        let db = Database::new(DbConfig::new(path)).await.unwrap();
        SqliteRegistry::open(db, Duration::from_secs(60)).await.unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_validity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let registry = SqliteRegistry::open(db, Duration::from_secs(60)).await.unwrap();

        assert_eq!(registry.publish_valid_tokens(&[token("a"), token("b")]).await.unwrap(), 2);
        assert_eq!(registry.publish_valid_tokens(&[token("a")]).await.unwrap(), 0);

        assert!(registry.is_valid(&token("a")).await.unwrap());
        assert!(!registry.is_valid(&token("z")).await.unwrap());
        assert_eq!(registry.valid_tokens().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unpublished_token_is_not_issued() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let registry = SqliteRegistry::open(db, Duration::from_secs(60)).await.unwrap();

        let err = registry
            .try_redeem(&token("ghost"), Utc::now(), "gate", "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotIssued { ref token } if token == "ghost"));
    }

    #[tokio::test]
    async fn test_stations_share_redemptions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let north = station(&path).await;
        north.publish_valid_tokens(&[token("alice")]).await.unwrap();
        let south = station(&path).await;

        let first = north
            .try_redeem(&token("alice"), Utc::now(), "north", "s1")
            .await
            .unwrap();
        assert!(first.is_first());

        south.feed().refresh().await.unwrap();
        assert!(south.subscribe_redeemed().borrow().contains(&token("alice")));

        let second = south
            .try_redeem(&token("alice"), Utc::now(), "south", "s2")
            .await
            .unwrap();
        assert!(matches!(second, RedeemOutcome::AlreadyRedeemed(ref r) if r.station_id == "north"));
        assert_eq!(south.redeemed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_stations_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let first = Arc::new(station(&path).await);
        first.publish_valid_tokens(&[token("contested")]).await.unwrap();
        let second = Arc::new(station(&path).await);

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let registry = if i % 2 == 0 { first.clone() } else { second.clone() };
                tokio::spawn(async move {
                    registry
                        .try_redeem(&token("contested"), Utc::now(), &format!("st-{i}"), &format!("sc-{i}"))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let winners = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .filter(|o| o.as_ref().unwrap().is_first())
            .count();
        assert_eq!(winners, 1);
    }
}
