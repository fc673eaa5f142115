//! # gatepass
//!
//! Issuing desk and check-in station for QR event tickets.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  guests.csv ──► generate ──► issue ──► publish ──► render ──► pack      │
//! │                                           │                  │          │
//! │                                           ▼                  ▼          │
//! │                                     registry.db         tickets.zip     │
//! │                                           ▲                             │
//! │  QR reader ──► stdin ──► scan ────────────┘ try_redeem                  │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                 VALID / ALREADY REDEEMED / UNKNOWN                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gatepass_sync::GatepassConfig;

mod commands;
mod roster;

#[derive(Parser)]
#[command(name = "gatepass")]
#[command(author, version, about = "Issue QR event tickets and check attendees in", long_about = None)]
struct Cli {
    /// Config file (default: gatepass.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue tokens for a roster, publish them and export a ticket bundle
    Generate {
        /// Roster CSV with a NAME column and optional Unique ID column
        #[arg(long)]
        roster: PathBuf,

        /// Background image for every ticket
        #[arg(long)]
        background: Option<PathBuf>,

        /// TrueType/OpenType font for attendee names
        #[arg(long)]
        font: Option<PathBuf>,

        /// Output directory for tickets.zip
        #[arg(long)]
        out: Option<PathBuf>,

        /// Skip publishing the issued tokens to the registry
        #[arg(long)]
        no_publish: bool,
    },

    /// Publish the Unique ID column of a CSV as valid tokens
    Publish {
        #[arg(long)]
        roster: PathBuf,
    },

    /// Read decoded scans from stdin, one per line, and print each outcome
    Scan,

    /// Show registry counts and health
    Status,

    /// Print the effective configuration
    Config {
        /// Save it to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = GatepassConfig::load(cli.config.clone()).context("Failed to load configuration")?;
    debug!(station_id = %config.station.id, "Configuration loaded");

    match cli.command {
        Commands::Generate {
            roster,
            background,
            font,
            out,
            no_publish,
        } => {
            let args = commands::generate::GenerateArgs {
                roster,
                background,
                font,
                out,
                publish: !no_publish,
            };
            commands::generate::run(&config, args).await?
        }
        Commands::Publish { roster } => commands::publish::run(&config, &roster).await?,
        Commands::Scan => commands::scan::run(&config).await?,
        Commands::Status => commands::status::run(&config).await?,
        Commands::Config { write } => commands::config::run(&config, cli.config, write)?,
    }

    Ok(())
}

/// Installs the tracing subscriber. Logs go to stderr so stdout carries only
/// command output.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=gatepass_sync=trace` - Trace registry traffic only
/// - Default: INFO, sqlx at WARN
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
