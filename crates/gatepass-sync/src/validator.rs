//! # Check-in Validator
//!
//! Turns one decode event into one [`ScanOutcome`] for one station.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ScanEvent { raw, scan_id }                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_scan_input(raw) ──── malformed ───► Err(Decode)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  precheck(local valid, redeemed snapshot)     (read-only)              │
//! │       ├── AlreadyRedeemed ─────────────────► AlreadyRedeemed           │
//! │       ├── NotInValidSet ── is_valid? ── no ─► Unknown                  │
//! │       │                       │ yes                                     │
//! │       ▼                       ▼                                         │
//! │  registry.try_redeem(token, now, station, scan_id)   (one write)       │
//! │       ├── FirstRedemption ─────────────────► Valid                     │
//! │       ├── AlreadyRedeemed ─────────────────► AlreadyRedeemed           │
//! │       ├── NotIssued ───────────────────────► Unknown                   │
//! │       ├── timeout / unreachable ───────────► Err(RegistryUnavailable)  │
//! │       └── any other registry error ────────► Err(RegistryFault)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every registry call is bounded by the configured timeout. A scan event
//! whose `try_redeem` failed with a retryable error is held; when the
//! operator retries it, the local fast path is skipped so a write that did
//! commit is reported as this event's `Valid` and not as `AlreadyRedeemed`.
//! Only the latest [`MAX_HELD_EVENTS`] failed events are held.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::StationConfig;
use crate::error::{CheckinError, SyncError, SyncResult};
use crate::registry::{RedeemedSnapshot, RegistrySync};
use gatepass_core::checkin::{precheck, Precheck};
use gatepass_core::validation::validate_scan_input;
use gatepass_core::{RedeemOutcome, ScanEvent, ScanOutcome, Token, ValidTokenSet};

/// Failed scan events remembered for retry. Older ones are forgotten.
pub const MAX_HELD_EVENTS: usize = 32;

/// Per-station check-in processor. Events are handled one at a time.
pub struct CheckinValidator {
    registry: Arc<dyn RegistrySync>,
    station: StationConfig,
    timeout: Duration,
    valid: ValidTokenSet,
    redeemed_rx: watch::Receiver<RedeemedSnapshot>,
    unresolved: VecDeque<String>,
}

impl CheckinValidator {
    /// Creates a validator and loads the registry's valid set.
    pub async fn new(
        registry: Arc<dyn RegistrySync>,
        station: StationConfig,
        timeout: Duration,
    ) -> SyncResult<Self> {
        let redeemed_rx = registry.subscribe_redeemed();
        let mut validator = CheckinValidator {
            registry,
            station,
            timeout,
            valid: ValidTokenSet::new(),
            redeemed_rx,
            unresolved: VecDeque::new(),
        };
        validator.refresh_valid().await?;

        info!(
            station_id = %validator.station.id,
            station = %validator.station.name,
            valid = validator.valid.len(),
            "Check-in validator ready"
        );
        Ok(validator)
    }

    /// Reloads the valid set from the registry. Returns how many tokens were
    /// new locally.
    pub async fn refresh_valid(&mut self) -> SyncResult<usize> {
        let registry = self.registry.clone();
        let remote = self.bounded(registry.valid_tokens()).await?;
        let added = self.valid.union(remote.iter().cloned());
        debug!(added, total = self.valid.len(), "Local valid set refreshed");
        Ok(added)
    }

    /// Local valid-set size.
    pub fn valid_count(&self) -> usize {
        self.valid.len()
    }

    /// Current redeemed snapshot as seen by this station.
    pub fn redeemed_snapshot(&self) -> RedeemedSnapshot {
        self.redeemed_rx.borrow().clone()
    }

    /// Classifies one decode event.
    ///
    /// ## Errors
    /// - [`CheckinError::Decode`] for malformed scan text
    /// - [`CheckinError::RegistryUnavailable`] if the registry timed out or
    ///   could not be reached; retry with the same event
    /// - [`CheckinError::RegistryFault`] if the registry rejected the call
    ///   for any other reason
    pub async fn process(&mut self, event: &ScanEvent) -> Result<ScanOutcome, CheckinError> {
        let token = validate_scan_input(&event.raw).map_err(|source| {
            debug!(scan_id = %event.scan_id, error = %source, "Rejected scan input");
            CheckinError::Decode {
                raw: event.raw.clone(),
                source,
            }
        })?;

        let retrying = self.unresolved.contains(&event.scan_id);
        if !retrying {
            let check = {
                let snapshot = self.redeemed_rx.borrow();
                precheck(&token, &self.valid, &snapshot)
            };
            match check {
                Precheck::AlreadyRedeemed => {
                    info!(token = %token, "Already redeemed (local view)");
                    return Ok(ScanOutcome::AlreadyRedeemed);
                }
                Precheck::NotInValidSet => {
                    if !self.lookup_validity(&token).await? {
                        info!(token = %token, "Unknown token");
                        return Ok(ScanOutcome::Unknown);
                    }
                }
                Precheck::Candidate => {}
            }
        }

        self.redeem(&token, event).await
    }

    async fn lookup_validity(&mut self, token: &Token) -> Result<bool, CheckinError> {
        let registry = self.registry.clone();
        let valid = self
            .bounded(registry.is_valid(token))
            .await
            .map_err(|source| registry_failure(token, source))?;

        if valid {
            // Published after this station loaded its set.
            self.valid.union([token.clone()]);
        }
        Ok(valid)
    }

    async fn redeem(&mut self, token: &Token, event: &ScanEvent) -> Result<ScanOutcome, CheckinError> {
        let registry = self.registry.clone();
        let result = self
            .bounded(registry.try_redeem(token, Utc::now(), &self.station.id, &event.scan_id))
            .await;

        match result {
            Ok(RedeemOutcome::FirstRedemption(redemption)) => {
                self.release(&event.scan_id);
                info!(
                    token = %token,
                    station_id = %redemption.station_id,
                    "Checked in"
                );
                Ok(ScanOutcome::Valid)
            }
            Ok(RedeemOutcome::AlreadyRedeemed(existing)) => {
                self.release(&event.scan_id);
                info!(
                    token = %token,
                    redeemed_by = %existing.station_id,
                    redeemed_at = %existing.redeemed_at,
                    "Already redeemed"
                );
                Ok(ScanOutcome::AlreadyRedeemed)
            }
            Err(SyncError::NotIssued { .. }) => {
                self.release(&event.scan_id);
                warn!(token = %token, "Registry has no record of token");
                Ok(ScanOutcome::Unknown)
            }
            Err(source) => {
                if source.is_retryable() {
                    self.hold(&event.scan_id);
                } else {
                    self.release(&event.scan_id);
                }
                error!(token = %token, scan_id = %event.scan_id, error = %source, "Redemption failed");
                Err(registry_failure(token, source))
            }
        }
    }

    fn hold(&mut self, scan_id: &str) {
        if self.unresolved.iter().any(|held| held == scan_id) {
            return;
        }
        if self.unresolved.len() == MAX_HELD_EVENTS {
            self.unresolved.pop_front();
        }
        self.unresolved.push_back(scan_id.to_string());
    }

    fn release(&mut self, scan_id: &str) {
        self.unresolved.retain(|held| held != scan_id);
    }

    /// Runs a registry call under the station's timeout.
    async fn bounded<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

fn registry_failure(token: &Token, source: SyncError) -> CheckinError {
    let token = token.to_string();
    if source.is_retryable() {
        CheckinError::RegistryUnavailable { token, source }
    } else {
        CheckinError::RegistryFault { token, source }
    }
}
