//! # Domain Types
//!
//! Core domain types used throughout Gatepass.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   RosterRow     │   │ AttendeeRecord  │   │   Redemption    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  name           │──►│  name           │   │  token          │       │
//! │  │  token (opt)    │   │  token          │   │  redeemed_at    │       │
//! │  │  extra columns  │   └─────────────────┘   │  station_id     │       │
//! │  └─────────────────┘                         │  scan_id        │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ValidTokenSet   │   │RedeemedTokenSet │   │  ScanOutcome    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  append-only    │   │  token → time   │   │  Valid          │       │
//! │  │  union          │   │  monotonic      │   │  AlreadyRedeemed│       │
//! │  └─────────────────┘   └─────────────────┘   │  Unknown        │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::validation::{validate_token, ValidationResult};

// =============================================================================
// Token
// =============================================================================

/// An opaque ticket identifier.
///
/// Generated tokens are hyphenated UUID v4 strings. Externally supplied
/// tokens are accepted as long as they pass [`validate_token`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Token(String);

impl Token {
    /// Generates a fresh random token (UUID v4, 122 random bits).
    pub fn generate() -> Self {
        Token(Uuid::new_v4().to_string())
    }

    /// Parses an externally supplied token, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let trimmed = raw.trim();
        validate_token(trimmed)?;
        Ok(Token(trimmed.to_string()))
    }

    /// Returns the token text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Roster Row
// =============================================================================

/// One raw roster row as read from the attendee list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    /// Display name (the `NAME` column).
    pub name: String,

    /// Pre-existing token from a `Unique ID` column, if the roster had one.
    pub token: Option<String>,

    /// Every other column, passed through untouched.
    pub extra: BTreeMap<String, String>,
}

impl RosterRow {
    /// Creates a row with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        RosterRow {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attaches an externally supplied token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

// =============================================================================
// Attendee Record
// =============================================================================

/// An attendee with their issued token. Immutable after issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AttendeeRecord {
    /// Display name, trimmed.
    pub name: String,

    /// The attendee's unique token.
    pub token: Token,
}

// =============================================================================
// Scan Outcome
// =============================================================================

/// Classification of a presented token. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// First redemption of a legitimately issued token: admit.
    Valid,
    /// The token was redeemed before.
    AlreadyRedeemed,
    /// The token was never issued.
    Unknown,
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanOutcome::Valid => write!(f, "valid"),
            ScanOutcome::AlreadyRedeemed => write!(f, "already_redeemed"),
            ScanOutcome::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Redemption
// =============================================================================

/// The persisted record of a token's first redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Redemption {
    pub token: Token,
    #[ts(as = "String")]
    pub redeemed_at: DateTime<Utc>,
    /// Station that performed the redemption.
    pub station_id: String,
    /// Decode event that performed the redemption.
    pub scan_id: String,
}

/// Result of an atomic conditional redemption write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// This call (or a retry of the same scan event) performed the first write.
    FirstRedemption(Redemption),
    /// Someone else redeemed the token first.
    AlreadyRedeemed(Redemption),
}

impl RedeemOutcome {
    /// Returns true if this call owns the redemption.
    pub fn is_first(&self) -> bool {
        matches!(self, RedeemOutcome::FirstRedemption(_))
    }

    /// The redemption record, whoever wrote it.
    pub fn redemption(&self) -> &Redemption {
        match self {
            RedeemOutcome::FirstRedemption(r) | RedeemOutcome::AlreadyRedeemed(r) => r,
        }
    }
}

// =============================================================================
// Scan Event
// =============================================================================

/// One decode event from a scanning station.
///
/// Retrying the same event after a registry failure reuses its `scan_id`, so
/// a redemption that did commit is recognised as this event's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub scan_id: String,
    pub raw: String,
    pub captured_at: DateTime<Utc>,
}

impl ScanEvent {
    /// Creates a new decode event stamped with the current time.
    pub fn new(raw: impl Into<String>) -> Self {
        ScanEvent {
            scan_id: Uuid::new_v4().to_string(),
            raw: raw.into(),
            captured_at: Utc::now(),
        }
    }
}

// =============================================================================
// Valid Token Set
// =============================================================================

/// Tokens known to be legitimately issued. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidTokenSet(HashSet<Token>);

impl ValidTokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions a batch into the set, returning how many tokens were new.
    pub fn union<I>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = Token>,
    {
        tokens
            .into_iter()
            .filter(|token| self.0.insert(token.clone()))
            .count()
    }

    #[inline]
    pub fn contains(&self, token: &Token) -> bool {
        self.0.contains(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.0.iter()
    }
}

impl FromIterator<Token> for ValidTokenSet {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        ValidTokenSet(iter.into_iter().collect())
    }
}

// =============================================================================
// Redeemed Token Set
// =============================================================================

/// Tokens already presented at check-in, with redemption time.
///
/// Entries are never removed or overwritten: the first insert wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedeemedTokenSet(HashMap<Token, DateTime<Utc>>);

impl RedeemedTokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-and-set: records `token` unless it is already present.
    ///
    /// Returns `true` iff this call inserted it.
    pub fn try_insert(&mut self, token: Token, at: DateTime<Utc>) -> bool {
        match self.0.entry(token) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(at);
                true
            }
        }
    }

    /// Merges redemptions observed elsewhere. Existing timestamps win.
    pub fn merge<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Token, DateTime<Utc>)>,
    {
        for (token, at) in entries {
            self.try_insert(token, at);
        }
    }

    #[inline]
    pub fn contains(&self, token: &Token) -> bool {
        self.0.contains_key(token)
    }

    pub fn redeemed_at(&self, token: &Token) -> Option<DateTime<Utc>> {
        self.0.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, &DateTime<Utc>)> {
        self.0.iter()
    }
}

impl FromIterator<(Token, DateTime<Utc>)> for RedeemedTokenSet {
    fn from_iter<I: IntoIterator<Item = (Token, DateTime<Utc>)>>(iter: I) -> Self {
        let mut set = RedeemedTokenSet::new();
        set.merge(iter);
        set
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
