//! Poll loop
//!
//! Waits for the target process, then polls the engine on a fixed interval
//! and writes each snapshot until the target exits or a poll fails.

use anyhow::{bail, Result};
use kappa_common::{OutputFormat, SnapshotRow, ViewerConfig};
use kappa_core::Engine;
use std::io::Write;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Retry attaching until the target shows up or the timeout elapses
pub fn wait_for_target(engine: &mut Engine, config: &ViewerConfig) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(config.attach_timeout_ms);
    loop {
        if engine.try_attach() {
            return true;
        }
        if config.attach_timeout_ms > 0 && start.elapsed() >= timeout {
            return false;
        }
        sleep(Duration::from_millis(config.attach_interval_ms));
    }
}

/// Format one snapshot for output
pub fn render(rows: &[SnapshotRow], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => rows
            .iter()
            .map(|row| format!("{}\n", row))
            .collect::<String>(),
        OutputFormat::Json => format!("{}\n", serde_json::to_string(rows)?),
    })
}

/// Drive the engine until the target terminates. With `once`, stop after the
/// first successful poll.
pub fn run<W: Write>(
    engine: &mut Engine,
    config: &ViewerConfig,
    once: bool,
    out: &mut W,
) -> Result<()> {
    let target = engine.target_name().to_string();

    if !engine.is_target_running() {
        writeln!(out, "Waiting for {}...", target)?;
        if !wait_for_target(engine, config) {
            bail!(
                "Timed out after {} ms waiting for {}",
                config.attach_timeout_ms,
                target
            );
        }
    }
    info!("Attached to {}", target);

    let interval = Duration::from_millis(config.poll_interval_ms);
    let mut polls: u64 = 0;
    loop {
        if !engine.is_target_running() {
            writeln!(out, "{} terminated", target)?;
            return Ok(());
        }

        let rows = match engine.poll() {
            Ok(rows) => rows,
            Err(e) if !engine.is_target_running() => {
                debug!("Poll failed after target exit: {}", e);
                writeln!(out, "{} terminated", target)?;
                return Ok(());
            }
            Err(e) => {
                error!("Poll failed: {}", e);
                return Err(e.into());
            }
        };
        polls += 1;

        if config.output == OutputFormat::Text && polls > 1 {
            writeln!(out)?;
        }
        out.write_all(render(&rows, config.output)?.as_bytes())?;
        out.flush()?;

        if once {
            return Ok(());
        }
        sleep(interval);
    }
}
