//! Dry run: show the plan, apply nothing.

use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;

use calmirror_core::config::SyncConfig;
use calmirror_core::reconcile::{ReconcileInput, build_plan};

use crate::commands::sync::take_snapshots;
use crate::render::render_plan;
use crate::utils::tui;

pub fn run(dir: &Path, verbose: bool) -> Result<()> {
    let config = SyncConfig::load(dir)?;

    let spinner = tui::create_spinner(format!("Checking {}", config.name));
    let snapshots = take_snapshots(&config);
    spinner.finish_and_clear();
    let snapshots = snapshots?;

    let plan = build_plan(&ReconcileInput {
        config: &config,
        source: &snapshots.source,
        targets: &snapshots.targets,
        mappings: &snapshots.mappings,
        now: snapshots.now,
    })?;

    println!("📅 {}", config.name);
    println!("{}", render_plan(&plan, verbose));

    if !plan.actions.is_empty() {
        let (created, updated, deleted) = plan.counts();
        println!("\nWould sync: {created} created, {updated} updated, {deleted} deleted");
        println!("{}", "Run `calmirror sync` to apply".dimmed());
    }

    Ok(())
}
