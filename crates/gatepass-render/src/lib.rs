//! # gatepass-render: Tickets and Bundles
//!
//! Pure bytes-in, bytes-out rendering of attendee records into PNG tickets,
//! and packaging of those tickets into `tickets.zip`.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Vec<AttendeeRecord> (gatepass-core::issue)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  batch::render_batch ── N renders in flight on the blocking pool       │
//! │       │     └── renderer::CredentialRenderer::render_on                │
//! │       │            ├── qr::encode            (level M, quiet zone)     │
//! │       │            └── layout::layout        (shrink, then wrap)       │
//! │       ▼                                                                 │
//! │  RenderReport { rendered, failed }                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  packager::pack ──► Bundle ──► write_to(dir) ──► dir/tickets.zip       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`qr`] - QR symbol generation
//! - [`layout`] - Band geometry and the name fitting policy
//! - [`renderer`] - Single ticket compositing
//! - [`batch`] - Bounded-concurrency batch rendering with partial-success reports
//! - [`packager`] - ZIP bundle with `manifest.csv`
//! - [`error`] - Render and packaging errors

pub mod batch;
pub mod error;
pub mod layout;
pub mod packager;
pub mod qr;
pub mod renderer;

pub use batch::{render_batch, Credential, RenderFailure, RenderReport};
pub use error::{PackError, PackResult, RenderError, RenderResult};
pub use packager::{pack, Bundle, FilenameAllocator, ManifestRow, BUNDLE_FILENAME, MANIFEST_FILENAME};
pub use renderer::{bundled_font, load_font, Backdrop, CredentialRenderer, ImageBlob, RenderOptions};
