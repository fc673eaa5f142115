//! # Repository Module
//!
//! Repository implementations for the registry tables.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SqliteRegistry (gatepass-sync)                                        │
//! │       │                                                                 │
//! │       ├── db.valid_tokens().publish(batch_id, &tokens)                 │
//! │       │         └── INSERT … ON CONFLICT DO NOTHING (union)            │
//! │       │                                                                 │
//! │       └── db.redemptions().try_redeem(&token, station, scan_id, now)   │
//! │                 └── INSERT … ON CONFLICT DO NOTHING (test-and-set)     │
//! │                                                                         │
//! │  Both tables are append-only. Nothing here updates or deletes a row.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`ValidTokenRepository`] - Published token union
//! - [`RedemptionRepository`] - First-redemption records and the feed cursor

pub mod redemption;
pub mod valid_token;

pub use redemption::RedemptionRepository;
pub use valid_token::ValidTokenRepository;
