//! # Commands
//!
//! One module per subcommand. Each takes the loaded configuration and
//! returns `anyhow::Result` to `main`.

pub mod config;
pub mod generate;
pub mod publish;
pub mod scan;
pub mod status;

use std::path::Path;

use anyhow::Context;
use tracing::debug;

use gatepass_db::{Database, DbConfig};
use gatepass_sync::{GatepassConfig, SqliteRegistry};

/// Opens the registry database, creating its directory if needed.
pub async fn open_database(config: &GatepassConfig) -> anyhow::Result<Database> {
    let path = &config.registry.database_path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    debug!(path = %path.display(), "Opening registry database");
    Database::new(DbConfig::new(path))
        .await
        .with_context(|| format!("Failed to open registry at {}", path.display()))
}

/// Opens the registry with its redeemed feed running.
pub async fn open_registry(config: &GatepassConfig) -> anyhow::Result<SqliteRegistry> {
    let db = open_database(config).await?;
    Ok(SqliteRegistry::open(db, config.poll_interval()).await?)
}

pub(crate) fn read_blob(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}
