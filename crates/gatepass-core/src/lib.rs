//! # gatepass-core: Pure Ticket Logic for Gatepass
//!
//! This crate holds the issuance and check-in rules as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gatepass Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    gatepass CLI                                 │   │
//! │  │    generate ──► publish ──► scan ──► status                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   gatepass-render (QR, PNG, ZIP)   gatepass-sync (registry)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ gatepass-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  issuer   │  │  checkin  │  │ validation│  │   │
//! │  │   │   Token   │  │  issue()  │  │ classify()│  │   names   │  │   │
//! │  │   │  Records  │  │           │  │ precheck()│  │   tokens  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Token, AttendeeRecord, token sets, outcomes)
//! - [`issuer`] - Roster → attendee records
//! - [`checkin`] - Check-in state machine
//! - [`validation`] - Name, token and scan input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use gatepass_core::{checkin, issue, RedeemedTokenSet, RosterRow, ScanOutcome, ValidTokenSet};
//!
//! let records = issue(&[RosterRow::named("Alice")]).unwrap();
//! let valid: ValidTokenSet = records.iter().map(|r| r.token.clone()).collect();
//! let mut redeemed = RedeemedTokenSet::new();
//!
//! let alice = &records[0].token;
//! assert_eq!(checkin::classify(alice, &valid, &mut redeemed, Utc::now()), ScanOutcome::Valid);
//! assert_eq!(
//!     checkin::classify(alice, &valid, &mut redeemed, Utc::now()),
//!     ScanOutcome::AlreadyRedeemed
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkin;
pub mod error;
pub mod issuer;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use issuer::issue;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a token in bytes.
///
/// A 512-byte payload fits comfortably in a version-20ish QR symbol at
/// error-correction level M, so valid tokens never fail to encode.
pub const MAX_TOKEN_BYTES: usize = 512;

/// Maximum attendee name length in Unicode scalar values.
pub const MAX_NAME_CHARS: usize = 200;
