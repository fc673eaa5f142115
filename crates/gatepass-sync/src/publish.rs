//! # Batch Publishing
//!
//! Pushes an issued batch into the registry, retrying transient failures
//! with exponential backoff. Publishing is a set union, so repeating a
//! partially applied call is harmless.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, info, warn};

use crate::config::RegistrySettings;
use crate::error::SyncResult;
use crate::registry::RegistrySync;
use gatepass_core::Token;

/// How hard to try before giving up on a publish.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RegistrySettings) -> Self {
        RetryPolicy {
            max_retries: settings.publish_retries,
            ..Default::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Publishes `tokens`, retrying retryable errors per `policy`.
///
/// ## Returns
/// How many tokens were new to the registry.
pub async fn publish_with_retry(
    registry: &dyn RegistrySync,
    tokens: &[Token],
    policy: RetryPolicy,
) -> SyncResult<usize> {
    let mut backoff = policy.create_backoff();
    let mut attempt = 0u32;

    loop {
        match registry.publish_valid_tokens(tokens).await {
            Ok(added) => {
                info!(submitted = tokens.len(), added, attempt, "Batch published");
                return Ok(added);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
                warn!(error = %e, attempt, ?delay, "Publish failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(error = %e, attempt, "Publish failed, giving up");
                return Err(e);
            }
        }
    }
}
