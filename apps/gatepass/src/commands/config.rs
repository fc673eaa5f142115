//! # Config Command

use std::path::PathBuf;

use gatepass_sync::GatepassConfig;

/// Prints the effective configuration; with `write`, saves it too.
///
/// Saving pins the station id, which is otherwise regenerated on each run
/// when no config file exists.
pub fn run(config: &GatepassConfig, path: Option<PathBuf>, write: bool) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);

    if write {
        let saved = config.save(path)?;
        eprintln!("Saved configuration to {}", saved.display());
    }
    Ok(())
}
