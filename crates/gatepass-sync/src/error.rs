//! # Sync Error Types
//!
//! Error types for registry access and check-in.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Registry     │  │     Feed / Actor        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Unavailable ⟳  │  │  ChannelError           │ │
//! │  │  MissingStation │  │  Timeout     ⟳  │  │  ShuttingDown           │ │
//! │  │  ConfigLoad/Save│  │  NotIssued      │  │                         │ │
//! │  │                 │  │  Store          │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ⟳ = retryable. At the check-in desk these become                      │
//! │  CheckinError::RegistryUnavailable, other registry failures become     │
//! │  RegistryFault, and NotIssued becomes Unknown.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use gatepass_core::ValidationError;
use gatepass_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Registry, feed and configuration failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Station id is empty.
    #[error("Station ID not configured")]
    MissingStationId,

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// The shared store could not be reached or stayed busy.
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    /// A registry call did not finish within the configured bound.
    #[error("Registry call timed out after {0} ms")]
    Timeout(u64),

    /// Redemption attempted for a token that was never published.
    #[error("Token '{token}' was never issued")]
    NotIssued { token: String },

    /// The store rejected the request or returned unusable data.
    #[error("Registry store error: {0}")]
    Store(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Background task is shutting down.
    #[error("Redeemed feed is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            SyncError::Unavailable(err.to_string())
        } else {
            SyncError::Store(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the same call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Unavailable(_) | SyncError::Timeout(_) | SyncError::ChannelError(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingStationId
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

// =============================================================================
// Check-in Errors
// =============================================================================

/// Why a scan produced no outcome.
///
/// `Unknown` and `AlreadyRedeemed` are outcomes, not errors.
#[derive(Debug, Error)]
pub enum CheckinError {
    /// The scanned text is not a well-formed token.
    #[error("Decode error for scan '{raw}': {source}")]
    Decode {
        raw: String,
        #[source]
        source: ValidationError,
    },

    /// The registry could not answer. Retry the same scan event.
    #[error("Registry unavailable while checking '{token}': {source}")]
    RegistryUnavailable {
        token: String,
        #[source]
        source: SyncError,
    },

    /// The registry answered with an error that repeating will not fix,
    /// such as a row it cannot read back.
    #[error("Registry error while checking '{token}': {source}")]
    RegistryFault {
        token: String,
        #[source]
        source: SyncError,
    },
}

impl CheckinError {
    /// Returns true if re-submitting the same scan event may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckinError::RegistryUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Unavailable("locked".into()).is_retryable());
        assert!(SyncError::Timeout(2000).is_retryable());

        assert!(!SyncError::NotIssued { token: "t".into() }.is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::Store("corrupt".into()).is_retryable());
    }

    #[test]
    fn test_db_errors_classified() {
        assert!(SyncError::from(DbError::Busy).is_retryable());
        assert!(!SyncError::from(DbError::corrupt("redemptions", "bad")).is_retryable());
    }

    #[test]
    fn test_checkin_error_carries_token() {
        let err = CheckinError::RegistryUnavailable {
            token: "tok-123".into(),
            source: SyncError::Timeout(2000),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("tok-123"));

        let err = CheckinError::Decode {
            raw: String::new(),
            source: ValidationError::Required {
                field: "scan".into(),
            },
        };
        assert!(!err.is_retryable());

        let err = CheckinError::RegistryFault {
            token: "tok-123".into(),
            source: SyncError::Store("corrupt row".into()),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("corrupt row"));
    }
}
