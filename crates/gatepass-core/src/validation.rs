//! # Validation Module
//!
//! Input validation for roster rows and scan input.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Roster reader / scan reader (CLI)                            │
//! │  ├── Column mapping, blank line skipping                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Names, tokens, decoded scan strings                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Registry (SQLite)                                            │
//! │  ├── PRIMARY KEY on tokens                                             │
//! │  └── FOREIGN KEY redemptions → valid_tokens                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use gatepass_core::validation::{validate_name, validate_scan_input};
//!
//! assert!(validate_name("Zoë Ångström").is_ok());
//! assert!(validate_scan_input("").is_err());
//! ```

use crate::error::ValidationError;
use crate::types::Token;
use crate::{MAX_NAME_CHARS, MAX_TOKEN_BYTES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Roster Validators
// =============================================================================

/// Validates an attendee display name.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_NAME_CHARS`] Unicode scalar values
/// - No control characters (newlines would break the manifest row layout)
///
/// Any script is accepted; the renderer wraps rather than truncates.
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::TooManyChars {
            field: "name".to_string(),
            max: MAX_NAME_CHARS,
        });
    }

    if name.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a token string (generated or externally supplied).
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_TOKEN_BYTES`] bytes, which keeps it well inside QR
///   capacity at error-correction level M
/// - No control characters and no surrounding whitespace
pub fn validate_token(token: &str) -> ValidationResult<()> {
    if token.is_empty() {
        return Err(ValidationError::Required {
            field: "token".to_string(),
        });
    }

    if token.len() > MAX_TOKEN_BYTES {
        return Err(ValidationError::TooLong {
            field: "token".to_string(),
            max: MAX_TOKEN_BYTES,
        });
    }

    if token.trim() != token {
        return Err(ValidationError::InvalidFormat {
            field: "token".to_string(),
            reason: "must not start or end with whitespace".to_string(),
        });
    }

    if token.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "token".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Scan Validators
// =============================================================================

/// Validates decoded text from a QR reader and turns it into a token.
///
/// Rejections here are decode errors, distinct from an `Unknown` outcome:
/// the reader produced something that cannot be a token at all.
pub fn validate_scan_input(decoded: &str) -> ValidationResult<Token> {
    let decoded = decoded.trim();

    if decoded.is_empty() {
        return Err(ValidationError::Required {
            field: "scan".to_string(),
        });
    }

    Token::parse(decoded).map_err(|err| match err {
        ValidationError::TooLong { max, .. } => ValidationError::TooLong {
            field: "scan".to_string(),
            max,
        },
        ValidationError::InvalidFormat { reason, .. } => ValidationError::InvalidFormat {
            field: "scan".to_string(),
            reason,
        },
        other => other,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Alice").is_ok());
        assert!(validate_name("李小龍").is_ok());
        assert!(validate_name("José 🎉 O'Brien-Smith").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("two\nlines").is_err());
        assert_eq!(
            validate_name(&"é".repeat(MAX_NAME_CHARS + 1)),
            Err(ValidationError::TooManyChars {
                field: "name".to_string(),
                max: MAX_NAME_CHARS,
            })
        );
        assert!(validate_name(&"é".repeat(MAX_NAME_CHARS)).is_ok());
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_token("EXT-0001").is_ok());

        assert!(validate_token("").is_err());
        assert!(validate_token(" padded").is_err());
        assert!(validate_token("tab\there").is_err());
        assert!(validate_token(&"x".repeat(MAX_TOKEN_BYTES + 1)).is_err());
    }

    #[test]
    fn test_validate_scan_input() {
        let token = validate_scan_input("  garbage \r\n").unwrap();
        assert_eq!(token.as_str(), "garbage");

        assert_eq!(
            validate_scan_input(""),
            Err(ValidationError::Required {
                field: "scan".to_string()
            })
        );
        assert!(matches!(
            validate_scan_input("bad\u{0}byte"),
            Err(ValidationError::InvalidFormat { field, .. }) if field == "scan"
        ));
        assert!(validate_scan_input(&"z".repeat(MAX_TOKEN_BYTES + 1)).is_err());
    }
}
