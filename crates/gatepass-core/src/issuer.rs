//! # Token Issuer
//!
//! Turns a roster into attendee records, one fresh token per row.
//!
//! ```text
//! RosterRow { NAME: "Alice" }                     ──► Alice  / 7c1e…-uuid
//! RosterRow { NAME: "Bob", Unique ID: "EXT-9" }   ──► Bob    / EXT-9
//! ```
//!
//! Each call is its own namespace: nothing is checked against earlier
//! batches. Tokens only become globally known when the registry unions them.

use std::collections::HashSet;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{AttendeeRecord, RosterRow, Token};
use crate::validation::validate_name;

/// Issues one [`AttendeeRecord`] per roster row, preserving row order.
///
/// Rows carrying a `Unique ID` keep it as their token; all others get a
/// freshly generated UUID v4.
///
/// ## Errors
/// - [`CoreError::EmptyBatch`] when `roster` is empty
/// - [`CoreError::InvalidRow`] for a blank/oversized name, a malformed
///   external token, or an external token repeated within this batch
///
/// ## Example
/// ```rust
/// use gatepass_core::{issue, RosterRow};
///
/// let records = issue(&[RosterRow::named("Alice"), RosterRow::named("Bob")]).unwrap();
/// assert_eq!(records.len(), 2);
/// assert_ne!(records[0].token, records[1].token);
/// ```
pub fn issue(roster: &[RosterRow]) -> CoreResult<Vec<AttendeeRecord>> {
    if roster.is_empty() {
        return Err(CoreError::EmptyBatch);
    }

    let mut seen: HashSet<Token> = HashSet::with_capacity(roster.len());
    let mut records = Vec::with_capacity(roster.len());

    for (index, row) in roster.iter().enumerate() {
        let row_number = index + 1;
        let invalid = |source: ValidationError| CoreError::InvalidRow {
            row: row_number,
            name: row.name.clone(),
            source,
        };

        validate_name(&row.name).map_err(invalid)?;

        let token = match row.token.as_deref().map(str::trim) {
            Some(external) if !external.is_empty() => Token::parse(external).map_err(invalid)?,
            _ => Token::generate(),
        };

        if !seen.insert(token.clone()) {
            return Err(invalid(ValidationError::Duplicate {
                field: "token".to_string(),
                value: token.into_string(),
            }));
        }

        records.push(AttendeeRecord {
            name: row.name.trim().to_string(),
            token,
        });
    }

    Ok(records)
}
