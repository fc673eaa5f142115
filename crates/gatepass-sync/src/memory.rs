//! # In-Memory Registry
//!
//! A single-process [`RegistrySync`] behind one mutex. The lock makes
//! `try_redeem`'s check-and-insert atomic, and every first redemption is
//! pushed to subscribers before the lock is released.
//!
//! Fault injection ([`MemoryRegistry::inject_failures`],
//! [`MemoryRegistry::inject_store_faults`],
//! [`MemoryRegistry::delay_next_response`]) simulates an unreachable or slow
//! store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::registry::{RedeemedSnapshot, RegistrySync};
use gatepass_core::{RedeemOutcome, RedeemedTokenSet, Redemption, Token, ValidTokenSet};

#[derive(Debug, Default)]
struct State {
    valid: ValidTokenSet,
    redemptions: HashMap<Token, Redemption>,
    redeemed: RedeemedTokenSet,
}

/// Registry held entirely in process memory.
#[derive(Debug)]
pub struct MemoryRegistry {
    state: Mutex<State>,
    redeemed_tx: watch::Sender<RedeemedSnapshot>,
    pending_failures: AtomicU32,
    pending_store_faults: AtomicU32,
    next_delay_ms: AtomicU64,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        let (redeemed_tx, _) = watch::channel(Arc::new(RedeemedTokenSet::new()));
        MemoryRegistry {
            state: Mutex::new(State::default()),
            redeemed_tx,
            pending_failures: AtomicU32::new(0),
            pending_store_faults: AtomicU32::new(0),
            next_delay_ms: AtomicU64::new(0),
        }
    }

    /// Delays the next `try_redeem` response by `delay` *after* its write
    /// has been applied, like a store whose reply is lost in transit.
    pub fn delay_next_response(&self, delay: Duration) {
        self.next_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Makes the next `n` calls fail with [`SyncError::Unavailable`].
    pub fn inject_failures(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` calls fail with [`SyncError::Store`], which is
    /// not retryable.
    pub fn inject_store_faults(&self, n: u32) {
        self.pending_store_faults.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> SyncResult<()> {
        if take_one(&self.pending_store_faults) {
            return Err(SyncError::Store("injected store fault".into()));
        }
        if take_one(&self.pending_failures) {
            return Err(SyncError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl RegistrySync for MemoryRegistry {
    async fn publish_valid_tokens(&self, tokens: &[Token]) -> SyncResult<usize> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let added = state.valid.union(tokens.iter().cloned());
        debug!(submitted = tokens.len(), added, "Published to memory registry");
        Ok(added)
    }

    fn subscribe_redeemed(&self) -> watch::Receiver<RedeemedSnapshot> {
        self.redeemed_tx.subscribe()
    }

    async fn try_redeem(
        &self,
        token: &Token,
        at: DateTime<Utc>,
        station_id: &str,
        scan_id: &str,
    ) -> SyncResult<RedeemOutcome> {
        self.check_available()?;

        let outcome = {
            let mut state = self.state.lock().await;
            if !state.valid.contains(token) {
                return Err(SyncError::NotIssued {
                    token: token.to_string(),
                });
            }

            match state.redemptions.get(token) {
                Some(existing) if existing.scan_id == scan_id => {
                    RedeemOutcome::FirstRedemption(existing.clone())
                }
                Some(existing) => RedeemOutcome::AlreadyRedeemed(existing.clone()),
                None => {
                    let redemption = Redemption {
                        token: token.clone(),
                        redeemed_at: at,
                        station_id: station_id.to_string(),
                        scan_id: scan_id.to_string(),
                    };
                    state.redemptions.insert(token.clone(), redemption.clone());
                    state.redeemed.try_insert(token.clone(), at);
                    self.redeemed_tx.send_replace(Arc::new(state.redeemed.clone()));
                    RedeemOutcome::FirstRedemption(redemption)
                }
            }
        };

        let delay_ms = self.next_delay_ms.swap(0, Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        Ok(outcome)
    }

    async fn is_valid(&self, token: &Token) -> SyncResult<bool> {
        self.check_available()?;
        Ok(self.state.lock().await.valid.contains(token))
    }

    async fn valid_tokens(&self) -> SyncResult<ValidTokenSet> {
        self.check_available()?;
        Ok(self.state.lock().await.valid.clone())
    }

    async fn redeemed(&self) -> SyncResult<RedeemedTokenSet> {
        self.check_available()?;
        Ok(self.state.lock().await.redeemed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> Token {
        Token::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_publish_is_union() {
        let registry = MemoryRegistry::new();
        assert_eq!(
            registry.publish_valid_tokens(&[token("a"), token("b")]).await.unwrap(),
            2
        );
        assert_eq!(
            registry.publish_valid_tokens(&[token("b"), token("c")]).await.unwrap(),
            1
        );
        assert_eq!(registry.valid_tokens().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_try_redeem_twice() {
        let registry = MemoryRegistry::new();
        registry.publish_valid_tokens(&[token("t")]).await.unwrap();

        let first = registry.try_redeem(&token("t"), Utc::now(), "a", "s1").await.unwrap();
        let second = registry.try_redeem(&token("t"), Utc::now(), "b", "s2").await.unwrap();

        assert!(first.is_first());
        assert!(!second.is_first());
        assert_eq!(second.redemption().station_id, "a");
    }

    #[tokio::test]
    async fn test_unpublished_token_not_issued() {
        let registry = MemoryRegistry::new();
        let err = registry
            .try_redeem(&token("nope"), Utc::now(), "a", "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotIssued { .. }));
        assert!(registry.redeemed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_redemptions() {
        let registry = MemoryRegistry::new();
        registry.publish_valid_tokens(&[token("t")]).await.unwrap();
        let mut rx = registry.subscribe_redeemed();
        assert!(rx.borrow().is_empty());

        registry.try_redeem(&token("t"), Utc::now(), "a", "s1").await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().contains(&token("t")));
    }

    #[tokio::test]
    async fn test_concurrent_single_winner() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.publish_valid_tokens(&[token("t")]).await.unwrap();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .try_redeem(&token("t"), Utc::now(), &format!("st-{i}"), &format!("sc-{i}"))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let outcomes = futures_util::future::join_all(handles).await;
        let winners = outcomes
            .into_iter()
            .filter(|o| o.as_ref().unwrap().is_first())
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_retryable_and_finite() {
        let registry = MemoryRegistry::new();
        registry.inject_failures(2);

        assert!(registry.is_valid(&token("t")).await.unwrap_err().is_retryable());
        assert!(registry.valid_tokens().await.is_err());
        assert!(registry.valid_tokens().await.is_ok());
    }
}
