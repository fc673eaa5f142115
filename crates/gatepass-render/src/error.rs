//! # Render and Packaging Errors
//!
//! ```text
//! render(record) ──► EncodeFailure     token rejected by the QR encoder
//!                └─► RenderFailure     background/compositing/PNG encode
//!
//! pack(credentials) ──► PackagingFailure   empty input, archive, manifest, I/O
//! ```
//!
//! Every variant names the attendee or token it concerns so a batch report
//! can be read on its own.

use thiserror::Error;

/// Result type for rendering.
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type for packaging.
pub type PackResult<T> = Result<T, PackError>;

/// Ticket rendering failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The QR encoder rejected the token (e.g. too long for any version).
    #[error("Cannot encode token '{token}' as QR: {reason}")]
    Encode { token: String, reason: String },

    /// Compositing failed for one attendee.
    ///
    /// ## When This Occurs
    /// - Background image could not be decoded
    /// - The name needs more lines than the canvas can hold
    /// - PNG encoding failed
    #[error("Cannot render ticket for '{name}': {reason}")]
    Composite { name: String, reason: String },

    /// The configured font file could not be read or parsed.
    #[error("Cannot load font {path}: {reason}")]
    Font { path: String, reason: String },

    /// The render task panicked or was cancelled.
    #[error("Render task for '{name}' failed: {reason}")]
    TaskFailed { name: String, reason: String },
}

impl RenderError {
    pub(crate) fn composite(name: &str, reason: impl ToString) -> Self {
        RenderError::Composite {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Bundle packaging failures.
#[derive(Debug, Error)]
pub enum PackError {
    /// Nothing to pack.
    #[error("Nothing to pack: no rendered tickets")]
    Empty,

    /// Writing the ZIP archive failed.
    #[error("Archive write failed for '{entry}': {reason}")]
    Archive { entry: String, reason: String },

    /// Writing the manifest failed.
    #[error("Manifest write failed: {0}")]
    Manifest(String),

    /// Exporting the bundle to disk failed.
    #[error("Cannot write bundle to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
