//! # Generate Command
//!
//! ```text
//! roster.csv ─► issue ─► publish ─► render_batch ─► pack ─► <out>/tickets.zip
//! ```
//!
//! Tokens are published before rendering so a ticket never exists for a
//! token the stations cannot validate. Render failures are reported per
//! attendee; the bundle holds everyone else.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::roster::Roster;
use gatepass_core::{issue, Token};
use gatepass_render::{load_font, pack, render_batch, CredentialRenderer, ImageBlob, RenderOptions, RenderReport};
use gatepass_sync::{GatepassConfig, RenderSettings, RetryPolicy};

#[derive(Debug, Clone)]
pub struct GenerateArgs {
    pub roster: PathBuf,
    pub background: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub publish: bool,
}

pub async fn run(config: &GatepassConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let roster = Roster::from_path(&args.roster)
        .with_context(|| format!("Failed to read roster {}", args.roster.display()))?;
    let records = issue(&roster.rows)?;
    info!(count = records.len(), "Issued tokens");

    if args.publish {
        let registry = super::open_registry(config).await?;
        let tokens: Vec<Token> = records.iter().map(|r| r.token.clone()).collect();
        let added =
            super::publish::publish(&registry, &tokens, RetryPolicy::from_settings(&config.registry)).await?;
        registry.shutdown().await;
        println!("Published {} tokens ({} new)", tokens.len(), added);
    } else {
        warn!("Skipping publish; stations will report these tickets as unknown until published");
    }

    let renderer = build_renderer(&config.render, args.font.as_ref())?;
    let background = args
        .background
        .as_ref()
        .or(config.render.background_path.as_ref())
        .map(|path| super::read_blob(path).map(ImageBlob::new))
        .transpose()?;

    let report = render_batch(Arc::new(renderer), records, background).await;
    print_failures(&report);

    let bundle = pack(&report.rendered).context("Failed to package tickets")?;
    let out_dir = args.out.unwrap_or_else(|| config.output.dir.clone());
    let path = bundle.write_to(&out_dir)?;

    println!(
        "Wrote {} tickets to {} ({} failed)",
        bundle.manifest_row_count(),
        path.display(),
        report.failed.len()
    );
    Ok(())
}

pub(crate) fn render_options(settings: &RenderSettings) -> RenderOptions {
    RenderOptions {
        width: settings.width,
        height: settings.height,
        code_size: settings.code_size,
        base_font_px: settings.base_font_px,
        min_font_px: settings.min_font_px,
        concurrency: settings.concurrency,
    }
}

fn build_renderer(settings: &RenderSettings, font_override: Option<&PathBuf>) -> anyhow::Result<CredentialRenderer> {
    let renderer = CredentialRenderer::new(render_options(settings))?;
    match font_override.or(settings.font_path.as_ref()) {
        Some(path) => Ok(renderer.with_font(load_font(path)?)),
        None => Ok(renderer),
    }
}

fn print_failures(report: &RenderReport) {
    if report.is_complete() {
        return;
    }
    eprintln!("{} of {} tickets failed to render:", report.failed.len(), report.total());
    for failure in &report.failed {
        eprintln!("  {} ({}): {}", failure.record.name, failure.record.token, failure.error);
    }
}
