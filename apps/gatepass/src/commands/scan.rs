//! # Scan Command
//!
//! Reads decoded QR text from stdin, one scan per line, and prints one
//! outcome per line in input order.
//!
//! When the registry is unavailable the line is reported as retryable and
//! held. Scanning the same text again reuses the held event, so a
//! redemption that committed before the failure still reports `VALID`.
//! A line that is not UTF-8 is a decode error like any other malformed
//! scan; the session carries on.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use gatepass_core::{ScanEvent, ScanOutcome};
use gatepass_sync::{CheckinError, CheckinValidator, GatepassConfig};

/// Per-session counts, printed when input ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanTally {
    pub valid: usize,
    pub already_redeemed: usize,
    pub unknown: usize,
    pub decode_errors: usize,
    pub unavailable: usize,
    pub registry_errors: usize,
}

pub async fn run(config: &GatepassConfig) -> anyhow::Result<()> {
    let registry = Arc::new(super::open_registry(config).await?);
    let mut validator =
        CheckinValidator::new(registry.clone(), config.station.clone(), config.registry_timeout()).await?;

    eprintln!(
        "Station {} ready ({} valid tokens). Scan tickets, Ctrl-D to finish.",
        config.station.name,
        validator.valid_count()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let tally = scan_lines(&mut validator, stdin, &mut std::io::stdout()).await?;

    info!(?tally, "Scan session finished");
    eprintln!(
        "valid={} already_redeemed={} unknown={} decode_errors={} unavailable={} registry_errors={}",
        tally.valid,
        tally.already_redeemed,
        tally.unknown,
        tally.decode_errors,
        tally.unavailable,
        tally.registry_errors
    );
    registry.shutdown().await;
    Ok(())
}

pub async fn scan_lines<R, W>(
    validator: &mut CheckinValidator,
    mut input: R,
    out: &mut W,
) -> anyhow::Result<ScanTally>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut tally = ScanTally::default();
    let mut held: Option<ScanEvent> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let raw = strip_line_ending(&buf);

        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.to_string(),
            Err(e) => {
                warn!(error = %e, bytes = raw.len(), "Scan line is not UTF-8");
                held = None;
                tally.decode_errors += 1;
                writeln!(out, "DECODE ERROR\t{}", String::from_utf8_lossy(raw).trim())?;
                out.flush()?;
                continue;
            }
        };

        let event = match held.take() {
            Some(event) if event.raw == line => event,
            _ => ScanEvent::new(line),
        };

        let label = match validator.process(&event).await {
            Ok(ScanOutcome::Valid) => {
                tally.valid += 1;
                "VALID"
            }
            Ok(ScanOutcome::AlreadyRedeemed) => {
                tally.already_redeemed += 1;
                "ALREADY REDEEMED"
            }
            Ok(ScanOutcome::Unknown) => {
                tally.unknown += 1;
                "UNKNOWN"
            }
            Err(CheckinError::Decode { .. }) => {
                tally.decode_errors += 1;
                "DECODE ERROR"
            }
            Err(CheckinError::RegistryUnavailable { .. }) => {
                tally.unavailable += 1;
                held = Some(event.clone());
                "REGISTRY UNAVAILABLE (retry)"
            }
            Err(CheckinError::RegistryFault { .. }) => {
                tally.registry_errors += 1;
                "REGISTRY ERROR"
            }
        };

        writeln!(out, "{label}\t{}", event.raw.trim())?;
        out.flush()?;
    }

    Ok(tally)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
