//! # Error Types
//!
//! Domain-specific error types for gatepass-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  gatepass-core errors (this file)                                      │
//! │  ├── CoreError        - Issuance failures (EmptyBatch, ...)            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  gatepass-db errors       → DbError                                    │
//! │  gatepass-render errors   → RenderError, PackError                     │
//! │  gatepass-sync errors     → SyncError, CheckinError                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError::InvalidRow → CLI report            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Unknown` and `AlreadyRedeemed` are scan outcomes, not errors, and live
//! in [`crate::types::ScanOutcome`].

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ticket issuance errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The roster had no rows.
    ///
    /// ## When This Occurs
    /// - CSV file contained only a header
    /// - Every row was blank and skipped by the reader
    ///
    /// The caller decides whether to proceed or prompt for another roster.
    #[error("Roster is empty: nothing to issue")]
    EmptyBatch,

    /// A specific roster row failed validation.
    #[error("Roster row {row} ({name:?}): {source}")]
    InvalidRow {
        row: usize,
        name: String,
        #[source]
        source: ValidationError,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when roster or scan input doesn't meet requirements.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long, counted in bytes.
    #[error("{field} must be at most {max} bytes")]
    TooLong { field: String, max: usize },

    /// Field value has too many characters.
    #[error("{field} must be at most {max} characters")]
    TooManyChars { field: String, max: usize },

    /// Invalid format (e.g., control characters in a token).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value within one batch.
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CoreError::EmptyBatch.to_string(),
            "Roster is empty: nothing to issue"
        );

        let err = CoreError::InvalidRow {
            row: 3,
            name: "Bob".to_string(),
            source: ValidationError::Required {
                field: "name".to_string(),
            },
        };
        assert_eq!(err.to_string(), "Roster row 3 (\"Bob\"): name is required");
    }

    #[test]
    fn test_length_limits_name_their_unit() {
        let name = ValidationError::TooManyChars {
            field: "name".to_string(),
            max: 200,
        };
        assert_eq!(name.to_string(), "name must be at most 200 characters");

        let token = ValidationError::TooLong {
            field: "token".to_string(),
            max: 512,
        };
        assert_eq!(token.to_string(), "token must be at most 512 bytes");
    }
}
