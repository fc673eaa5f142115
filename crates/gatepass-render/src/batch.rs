//! # Batch Rendering
//!
//! Fans a batch of records out onto the blocking pool with a fixed number of
//! renders in flight.
//!
//! ```text
//! records ──► stream::iter ──► map(spawn_blocking render) ──► buffered(n)
//!                                                                │
//!            results come back in issuance order ◄───────────────┘
//!                       │
//!                       ▼
//!            RenderReport { rendered, failed }
//! ```
//!
//! A failed ticket never aborts the batch. Each failure is recorded with
//! the record it belongs to.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::RenderError;
use crate::renderer::{Backdrop, CredentialRenderer, ImageBlob};
use gatepass_core::AttendeeRecord;

/// A rendered ticket and the record it was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub record: AttendeeRecord,
    pub image: ImageBlob,
}

/// A ticket that could not be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFailure {
    pub record: AttendeeRecord,
    pub error: RenderError,
}

/// Outcome of a batch: successes and failures, each in issuance order.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub rendered: Vec<Credential>,
    pub failed: Vec<RenderFailure>,
}

impl RenderReport {
    /// True when every record rendered.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total records attempted.
    pub fn total(&self) -> usize {
        self.rendered.len() + self.failed.len()
    }
}

/// Renders every record, at most `renderer.options().concurrency` at once.
pub async fn render_batch(
    renderer: Arc<CredentialRenderer>,
    records: Vec<AttendeeRecord>,
    background: Option<ImageBlob>,
) -> RenderReport {
    let concurrency = renderer.options().concurrency.max(1);
    info!(
        count = records.len(),
        concurrency,
        background = background.is_some(),
        "Rendering ticket batch"
    );

    let backdrop = {
        let renderer = renderer.clone();
        tokio::task::spawn_blocking(move || renderer.prepare_backdrop(background.as_ref())).await
    };
    let backdrop = match backdrop {
        Ok(Ok(backdrop)) => Arc::new(backdrop),
        Ok(Err(e)) => {
            warn!(error = %e, "Background could not be decoded");
            return fail_all(records, |name| {
                RenderError::composite(name, format!("background: {e}"))
            });
        }
        Err(e) => {
            return fail_all(records, |name| RenderError::TaskFailed {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }
    };

    let results: Vec<(AttendeeRecord, Result<ImageBlob, RenderError>)> = stream::iter(records)
        .map(|record| {
            let renderer = renderer.clone();
            let backdrop = backdrop.clone();
            async move { render_one(renderer, backdrop, record).await }
        })
        .buffered(concurrency)
        .collect()
        .await;

    let mut report = RenderReport::default();
    for (record, result) in results {
        match result {
            Ok(image) => report.rendered.push(Credential { record, image }),
            Err(error) => {
                warn!(name = %record.name, token = %record.token, error = %error, "Ticket failed");
                report.failed.push(RenderFailure { record, error });
            }
        }
    }

    info!(
        rendered = report.rendered.len(),
        failed = report.failed.len(),
        "Ticket batch complete"
    );
    report
}

async fn render_one(
    renderer: Arc<CredentialRenderer>,
    backdrop: Arc<Backdrop>,
    record: AttendeeRecord,
) -> (AttendeeRecord, Result<ImageBlob, RenderError>) {
    let job = record.clone();
    let joined = tokio::task::spawn_blocking(move || renderer.render_on(&job, &backdrop)).await;

    let result = match joined {
        Ok(result) => result,
        Err(e) => Err(RenderError::TaskFailed {
            name: record.name.clone(),
            reason: e.to_string(),
        }),
    };
    (record, result)
}

fn fail_all(
    records: Vec<AttendeeRecord>,
    error_for: impl Fn(&str) -> RenderError,
) -> RenderReport {
    RenderReport {
        rendered: Vec::new(),
        failed: records
            .into_iter()
            .map(|record| RenderFailure {
                error: error_for(&record.name),
                record,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RenderOptions;
    use gatepass_core::{issue, RosterRow};

    fn renderer(concurrency: usize) -> Arc<CredentialRenderer> {
        Arc::new(
            CredentialRenderer::new(RenderOptions {
                concurrency,
                ..RenderOptions::default()
            })
            .unwrap(),
        )
    }

    fn records(n: usize) -> Vec<AttendeeRecord> {
        let roster: Vec<RosterRow> = (0..n).map(|i| RosterRow::named(format!("Guest {i}"))).collect();
        issue(&roster).unwrap()
    }

    #[tokio::test]
    async fn test_batch_preserves_issuance_order() {
        let input = records(9);
        let report = render_batch(renderer(3), input.clone(), None).await;

        assert!(report.is_complete());
        let names: Vec<&str> = report.rendered.iter().map(|c| c.record.name.as_str()).collect();
        let expected: Vec<&str> = input.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let mut input = records(3);
        // Too many lines for any canvas
        input[1].name = "W".repeat(5000);

        let report = render_batch(renderer(2), input.clone(), None).await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.rendered.len(), 2);
        assert_eq!(report.rendered[0].record, input[0]);
        assert_eq!(report.rendered[1].record, input[2]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].record, input[1]);
        assert!(matches!(report.failed[0].error, RenderError::Composite { .. }));
    }

    #[tokio::test]
    async fn test_bad_background_fails_every_ticket() {
        let input = records(4);
        let junk = ImageBlob::new(vec![0u8; 16]);

        let report = render_batch(renderer(4), input, Some(junk)).await;

        assert!(report.rendered.is_empty());
        assert_eq!(report.failed.len(), 4);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_renders() {
        let report = render_batch(renderer(0), records(2), None).await;
        assert_eq!(report.rendered.len(), 2);
    }
}
