//! # gatepass-db: Registry Persistence for Gatepass
//!
//! The shared SQLite registry behind every scanning station: the union of
//! published tokens and the first redemption of each one.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Station A            Station B            Station C                    │
//! │  (gatepass scan)      (gatepass scan)      (gatepass scan)             │
//! │       │                    │                    │                       │
//! │       └────────────────────┼────────────────────┘                       │
//! │                            ▼                                            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  gatepass-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐   ┌─────────────┐  │   │
//! │  │   │   Database    │    │  Repositories    │   │ Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ ValidTokenRepo   │   │ (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ RedemptionRepo   │   │ 001_init    │  │   │
//! │  │   └───────────────┘    └──────────────────┘   └─────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                 registry.db on a shared volume                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatepass_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("registry.db")).await?;
//! db.valid_tokens().publish("batch-1", &tokens).await?;
//! let outcome = db.redemptions().try_redeem(&token, "gate-a", &scan_id, Utc::now()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, Location};

pub use repository::redemption::{FeedEntry, RedemptionRepository};
pub use repository::valid_token::ValidTokenRepository;
