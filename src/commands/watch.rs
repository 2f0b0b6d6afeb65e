//! Periodic sync loop.
//!
//! Cycles are strictly serialized: the next one is only scheduled after
//! the previous one finished, so two cycles can never race on the same
//! mapping table. Failed cycles back off exponentially with jitter and
//! leave the mapping table exactly as the last successful apply left it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use rand::Rng;
use tracing::{error, info};

use calmirror_core::config::SyncConfig;

use crate::commands::sync::run_cycle;

/// Backoff cap; one bad hour should not become a silent day
const MAX_DELAY: Duration = Duration::from_secs(60 * 60);

pub async fn run(dir: &Path, interval_override: Option<String>) -> Result<()> {
    // Validate config (and any --interval) up front so a typo fails fast
    let config = SyncConfig::load(dir)?;
    let interval = match interval_override {
        Some(ref s) => humantime::parse_duration(s)
            .map_err(|e| anyhow::anyhow!("Invalid interval '{s}': {e}"))?,
        None => config.interval()?,
    };

    println!(
        "Watching {} (every {})",
        config.name,
        humantime::format_duration(interval)
    );

    let dir: PathBuf = dir.to_path_buf();
    let mut consecutive_failures: u32 = 0;

    loop {
        // Reload each cycle so config edits take effect without a restart
        let outcome = SyncConfig::load(&dir)
            .map_err(anyhow::Error::from)
            .and_then(|config| run_cycle(&config));
        match outcome {
            Ok((_, summary)) => {
                consecutive_failures = 0;
                if !summary.is_noop() {
                    println!("Synced: {summary}");
                }
            }
            Err(e) => {
                consecutive_failures += 1;
                error!(failures = consecutive_failures, error = %e, "sync cycle failed");
                eprintln!("{}", format!("Sync failed: {e}").red());
            }
        }

        let delay = next_delay(interval, consecutive_failures);
        info!(delay_secs = delay.as_secs(), "next cycle scheduled");
        tokio::time::sleep(delay).await;
    }
}

/// Interval with exponential backoff after failures, capped, plus up to
/// 10% jitter so parallel syncs against one provider don't align.
fn next_delay(interval: Duration, consecutive_failures: u32) -> Duration {
    let factor = 2u32.saturating_pow(consecutive_failures.min(5));
    let backed_off = interval.saturating_mul(factor).min(MAX_DELAY);

    let jitter = rand::thread_rng().gen_range(0.0..0.1);
    backed_off.mul_f64(1.0 + jitter)
}
