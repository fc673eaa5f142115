//! # gatepass-sync: Registry Sync and Check-in for Gatepass
//!
//! Everything that touches shared state between stations lives here: the
//! [`RegistrySync`] contract, its SQLite and in-memory implementations, the
//! redeemed feed, and the per-station check-in validator.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Station Process                                │
//! │                                                                         │
//! │  scanner text ──► CheckinValidator ──► VALID / ALREADY REDEEMED /      │
//! │                        │   ▲           UNKNOWN / error                  │
//! │          try_redeem    │   │ watch::Receiver<RedeemedSnapshot>          │
//! │          is_valid      │   │                                            │
//! │                        ▼   │                                            │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 dyn RegistrySync                                 │  │
//! │  │                                                                  │  │
//! │  │  SqliteRegistry ───────────────────┐    MemoryRegistry           │  │
//! │  │    conditional INSERT              │    Mutex<State>             │  │
//! │  │    RedeemedFeed actor (polls)      │    pushes on write          │  │
//! │  └────────────────────────────────────┼─────────────────────────────┘  │
//! │                                       │                                 │
//! └───────────────────────────────────────┼─────────────────────────────────┘
//!                                         ▼
//!                             shared registry.db (WAL)
//! ```
//!
//! ## Module Organization
//! - [`config`] - Station configuration (TOML + env overrides)
//! - [`error`] - Sync and check-in error types
//! - [`registry`] - The `RegistrySync` trait
//! - [`sqlite`] - Registry over a shared SQLite file
//! - [`memory`] - Single-process registry with fault injection
//! - [`feed`] - Background poller that publishes the redeemed set
//! - [`publish`] - Batch publishing with retry/backoff
//! - [`validator`] - Scan → outcome
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatepass_db::{Database, DbConfig};
//! use gatepass_sync::{CheckinValidator, GatepassConfig, SqliteRegistry};
//!
//! let config = GatepassConfig::load(None)?;
//! let db = Database::new(DbConfig::new(&config.registry.database_path)).await?;
//! let registry = Arc::new(SqliteRegistry::open(db, config.poll_interval()).await?);
//!
//! let mut validator =
//!     CheckinValidator::new(registry, config.station.clone(), config.registry_timeout()).await?;
//! let outcome = validator.process(&ScanEvent::new(line)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod feed;
pub mod memory;
pub mod publish;
pub mod registry;
pub mod sqlite;
pub mod validator;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{GatepassConfig, OutputSettings, RegistrySettings, RenderSettings, StationConfig};
pub use error::{CheckinError, SyncError, SyncResult};
pub use feed::{FeedHandle, RedeemedFeed};
pub use memory::MemoryRegistry;
pub use publish::{publish_with_retry, RetryPolicy};
pub use registry::{RedeemedSnapshot, RegistrySync};
pub use sqlite::SqliteRegistry;
pub use validator::CheckinValidator;
