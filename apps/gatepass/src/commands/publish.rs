//! # Publish Command
//!
//! Publishes externally issued tokens (the `Unique ID` column) as valid.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::roster::Roster;
use gatepass_sync::{publish_with_retry, GatepassConfig, RegistrySync, RetryPolicy};

pub async fn run(config: &GatepassConfig, roster_path: &Path) -> anyhow::Result<()> {
    let roster = Roster::from_path(roster_path)
        .with_context(|| format!("Failed to read roster {}", roster_path.display()))?;
    let tokens = roster.tokens()?;
    if tokens.is_empty() {
        anyhow::bail!("No Unique IDs found in {}", roster_path.display());
    }

    let registry = super::open_registry(config).await?;
    let added = publish(&registry, &tokens, RetryPolicy::from_settings(&config.registry)).await?;
    registry.shutdown().await;

    println!("Published {} tokens ({} new)", tokens.len(), added);
    Ok(())
}

pub(crate) async fn publish(
    registry: &dyn RegistrySync,
    tokens: &[gatepass_core::Token],
    policy: RetryPolicy,
) -> anyhow::Result<usize> {
    info!(count = tokens.len(), "Publishing valid tokens");
    publish_with_retry(registry, tokens, policy)
        .await
        .context("Failed to publish tokens to the registry")
}
