//! # Registry Sync Contract
//!
//! The one place shared mutable state lives. Every station talks to the
//! registry through [`RegistrySync`]; anything with an atomic conditional
//! write can stand behind it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  issuing desk ── publish_valid_tokens(batch) ──►┐                       │
//! │                                                  │                       │
//! │                                          ┌───────▼────────┐             │
//! │  station A ── try_redeem ───────────────►│    Registry    │             │
//! │  station B ── try_redeem ───────────────►│  valid ⊇ redeemed            │
//! │      ▲                                   └───────┬────────┘             │
//! │      │                                           │                       │
//! │      └──────── subscribe_redeemed() ◄────────────┘                       │
//! │                watch::Receiver<RedeemedSnapshot>                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations:
//! - [`crate::sqlite::SqliteRegistry`] - shared SQLite file, polled feed
//! - [`crate::memory::MemoryRegistry`] - single process, pushed feed

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::SyncResult;
use gatepass_core::{RedeemOutcome, RedeemedTokenSet, Token, ValidTokenSet};

/// Point-in-time copy of the redeemed set, shared cheaply between readers.
pub type RedeemedSnapshot = Arc<RedeemedTokenSet>;

/// Shared registry of valid and redeemed tokens.
#[async_trait]
pub trait RegistrySync: Send + Sync {
    /// Unions `tokens` into the valid set. Idempotent.
    ///
    /// ## Returns
    /// How many tokens were new.
    async fn publish_valid_tokens(&self, tokens: &[Token]) -> SyncResult<usize>;

    /// Live view of `token → redeemed_at`. The value only ever grows.
    fn subscribe_redeemed(&self) -> watch::Receiver<RedeemedSnapshot>;

    /// Atomic test-and-set of `token`'s redemption.
    ///
    /// ## Errors
    /// - [`crate::SyncError::NotIssued`] if `token` was never published
    /// - a retryable error if the store could not be reached; the write
    ///   either happened in full or not at all, and repeating the call with
    ///   the same `scan_id` reports this caller as the owner if it did
    async fn try_redeem(
        &self,
        token: &Token,
        at: DateTime<Utc>,
        station_id: &str,
        scan_id: &str,
    ) -> SyncResult<RedeemOutcome>;

    /// Whether `token` has been published.
    async fn is_valid(&self, token: &Token) -> SyncResult<bool>;

    /// Every published token.
    async fn valid_tokens(&self) -> SyncResult<ValidTokenSet>;

    /// Every redemption, read from the store rather than the feed.
    async fn redeemed(&self) -> SyncResult<RedeemedTokenSet>;
}
