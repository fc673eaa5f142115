//! # Redeemed Feed
//!
//! Background task that follows the shared `redemptions` table and
//! publishes snapshots of the redeemed set to subscribers.
//!
//! ## Actor Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   FeedHandle ──── mpsc<FeedCommand> ────┐                              │
//! │   (refresh, nudge, shutdown)            │                              │
//! │                                         ▼                              │
//! │                              ┌──────────────────────┐                  │
//! │   interval.tick() ─────────► │    RedeemedFeed      │                  │
//! │                              │  cursor = last rowid │                  │
//! │                              │  view   = redeemed   │                  │
//! │                              └──────────┬───────────┘                  │
//! │                                         │ list_since(cursor)           │
//! │                                         ▼                              │
//! │                              redemptions (SQLite)                      │
//! │                                         │                              │
//! │                                         ▼ new rows?                    │
//! │                   watch::Sender<RedeemedSnapshot>::send_replace        │
//! │                                         │                              │
//! │                                         ▼                              │
//! │                     validators: watch::Receiver::borrow()              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed poll leaves the view stale but never wrong: the redeemed set
//! only grows and `try_redeem` re-checks against the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::registry::RedeemedSnapshot;
use gatepass_core::RedeemedTokenSet;
use gatepass_db::RedemptionRepository;

/// Rows fetched per query while catching up.
const PAGE_SIZE: u32 = 500;

enum FeedCommand {
    /// Poll now; reply with the number of new redemptions if asked.
    Refresh(Option<oneshot::Sender<SyncResult<usize>>>),
    Shutdown,
}

/// Handle for controlling a running [`RedeemedFeed`].
#[derive(Debug, Clone)]
pub struct FeedHandle {
    commands_tx: mpsc::Sender<FeedCommand>,
}

impl FeedHandle {
    /// Polls immediately and waits until subscribers have the result.
    pub async fn refresh(&self) -> SyncResult<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands_tx
            .send(FeedCommand::Refresh(Some(reply_tx)))
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        reply_rx.await.map_err(|_| SyncError::ShuttingDown)?
    }

    /// Requests a poll without waiting. Dropped if one is already queued.
    pub fn nudge(&self) {
        let _ = self.commands_tx.try_send(FeedCommand::Refresh(None));
    }

    /// Stops the feed task.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.commands_tx
            .send(FeedCommand::Shutdown)
            .await
            .map_err(|_| SyncError::ChannelError("Feed command channel closed".into()))
    }
}

/// Polls the redemptions table and publishes redeemed-set snapshots.
pub struct RedeemedFeed {
    repo: RedemptionRepository,
    poll_interval: Duration,
    cursor: i64,
    view: RedeemedTokenSet,
    snapshot_tx: watch::Sender<RedeemedSnapshot>,
    commands_rx: mpsc::Receiver<FeedCommand>,
    consecutive_failures: u32,
}

impl RedeemedFeed {
    /// Creates a feed and returns it with its handle and a subscriber.
    pub fn new(
        repo: RedemptionRepository,
        poll_interval: Duration,
    ) -> (Self, FeedHandle, watch::Receiver<RedeemedSnapshot>) {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(RedeemedTokenSet::new()));

        let feed = RedeemedFeed {
            repo,
            poll_interval,
            cursor: 0,
            view: RedeemedTokenSet::new(),
            snapshot_tx,
            commands_rx,
            consecutive_failures: 0,
        };

        (feed, FeedHandle { commands_tx }, snapshot_rx)
    }

    /// Reads every redemption past the cursor and publishes a new snapshot
    /// if anything arrived.
    pub async fn poll_once(&mut self) -> SyncResult<usize> {
        let mut added = 0;
        loop {
            let page = self.repo.list_since(self.cursor, PAGE_SIZE).await?;
            let fetched = page.len();

            for entry in page {
                self.cursor = entry.seq;
                let redemption = entry.redemption;
                if self.view.try_insert(redemption.token, redemption.redeemed_at) {
                    added += 1;
                }
            }

            if fetched < PAGE_SIZE as usize {
                break;
            }
        }

        if added > 0 {
            self.snapshot_tx.send_replace(Arc::new(self.view.clone()));
            debug!(added, total = self.view.len(), cursor = self.cursor, "Redeemed view updated");
        }
        Ok(added)
    }

    /// Runs the feed loop until shut down or every handle is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Redeemed feed starting");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let result = self.poll_once().await;
                    self.record(&result);
                }

                command = self.commands_rx.recv() => match command {
                    Some(FeedCommand::Refresh(reply)) => {
                        let result = self.poll_once().await;
                        self.record(&result);
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    }
                    Some(FeedCommand::Shutdown) | None => {
                        info!("Redeemed feed shutting down");
                        break;
                    }
                },
            }
        }

        info!("Redeemed feed stopped");
    }

    fn record(&mut self, result: &SyncResult<usize>) {
        match result {
            Ok(_) => {
                if self.consecutive_failures > 0 {
                    info!(failures = self.consecutive_failures, "Redeemed feed recovered");
                }
                self.consecutive_failures = 0;
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    error = %e,
                    failures = self.consecutive_failures,
                    "Redeemed feed poll failed, local view is stale"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatepass_core::Token;
    use gatepass_db::{Database, DbConfig};

    async fn db_with(tokens: &[&str]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tokens: Vec<Token> = tokens.iter().map(|t| Token::parse(t).unwrap()).collect();
        db.valid_tokens().publish("b", &tokens).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_poll_once_advances_cursor() {
        let db = db_with(&["a", "b"]).await;
        let (mut feed, _handle, rx) = RedeemedFeed::new(db.redemptions(), Duration::from_secs(60));

        assert_eq!(feed.poll_once().await.unwrap(), 0);

        db.redemptions()
            .try_redeem(&Token::parse("a").unwrap(), "gate", "s1", Utc::now())
            .await
            .unwrap();
        assert_eq!(feed.poll_once().await.unwrap(), 1);
        assert_eq!(feed.poll_once().await.unwrap(), 0);

        assert!(rx.borrow().contains(&Token::parse("a").unwrap()));
        assert!(!rx.borrow().contains(&Token::parse("b").unwrap()));
    }

    #[tokio::test]
    async fn test_handle_refresh_and_shutdown() {
        let db = db_with(&["a"]).await;
        let (feed, handle, rx) = RedeemedFeed::new(db.redemptions(), Duration::from_secs(60));
        let task = tokio::spawn(feed.run());

        db.redemptions()
            .try_redeem(&Token::parse("a").unwrap(), "gate", "s1", Utc::now())
            .await
            .unwrap();

        handle.refresh().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.refresh().await, Err(SyncError::ShuttingDown)));
    }
}
