//! One reconcile-and-apply cycle.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use owo_colors::OwoColorize;
use tracing::info;

use calmirror_core::config::SyncConfig;
use calmirror_core::event::{Occurrence, TargetEvent};
use calmirror_core::mapping::MappingRow;
use calmirror_core::plan::{Plan, RunSummary};
use calmirror_core::reconcile::{ReconcileInput, build_plan};
use calmirror_core::store::MappingStore;

use crate::apply::apply_plan;
use crate::calendar::CalendarDir;
use crate::render::render_plan;
use crate::utils::tui;

/// Everything a cycle needs, gathered before the engine runs.
pub struct Snapshots {
    pub target: CalendarDir,
    pub store: MappingStore,
    pub source: Vec<Occurrence>,
    pub targets: Vec<TargetEvent>,
    pub mappings: Vec<MappingRow>,
    pub now: DateTime<Utc>,
}

/// Take all four snapshots for a sync, atomically from the engine's
/// point of view: nothing is re-read once planning starts.
pub fn take_snapshots(config: &SyncConfig) -> Result<Snapshots> {
    let now = Utc::now();
    let horizon_end = now + Duration::days(config.horizon_days);

    let source_cal = CalendarDir::open(&config.source, "source")?;
    let source = source_cal.source_occurrences(now, horizon_end)?;

    let target = CalendarDir::open(&config.target, &config.target_calendar_id)?;
    let targets = target.target_events()?;

    let store = MappingStore::open(&config.target);
    let mappings = store.load()?;

    Ok(Snapshots {
        target,
        store,
        source,
        targets,
        mappings,
        now,
    })
}

/// Plan and apply one cycle. Used by both `sync` and `watch`.
pub fn run_cycle(config: &SyncConfig) -> Result<(Plan, RunSummary)> {
    let mut snapshots = take_snapshots(config)?;

    let plan = build_plan(&ReconcileInput {
        config,
        source: &snapshots.source,
        targets: &snapshots.targets,
        mappings: &snapshots.mappings,
        now: snapshots.now,
    })?;

    let summary = apply_plan(
        &plan,
        &snapshots.target,
        &snapshots.store,
        &mut snapshots.mappings,
        &config.name,
        snapshots.now,
    )?;

    info!(
        sync = %config.name,
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        failed = summary.failed,
        "cycle complete"
    );
    Ok((plan, summary))
}

pub fn run(dir: &Path, verbose: bool) -> Result<()> {
    let config = SyncConfig::load(dir)?;

    let spinner = tui::create_spinner(format!("Syncing {}", config.name));
    let result = run_cycle(&config);
    spinner.finish_and_clear();

    println!("📅 {}", config.name);
    let (plan, summary) = result?;
    println!("{}", render_plan(&plan, verbose));

    if summary.is_noop() {
        println!("\n{}", "Already in sync".dimmed());
    } else {
        println!("\nSynced: {summary}");
    }
    if summary.failed > 0 {
        println!(
            "{}",
            format!("{} action(s) failed; they will be retried next run", summary.failed).red()
        );
    }

    Ok(())
}
