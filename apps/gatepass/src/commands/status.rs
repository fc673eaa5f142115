//! # Status Command

use gatepass_sync::GatepassConfig;

pub async fn run(config: &GatepassConfig) -> anyhow::Result<()> {
    let db = super::open_database(config).await?;

    let healthy = db.health_check().await;
    let valid = db.valid_tokens().count().await?;
    let redeemed = db.redemptions().count().await?;

    println!("Station:   {} ({})", config.station.name, config.station.id);
    println!("Registry:  {}", config.registry.database_path.display());
    println!("Health:    {}", if healthy { "ok" } else { "unreachable" });
    println!("Valid:     {valid}");
    println!("Redeemed:  {redeemed}");

    db.close().await;
    Ok(())
}
