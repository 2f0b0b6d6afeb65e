//! Delete every event this sync manages in the target calendar.
//!
//! Bypasses the normal create/update path, but every candidate still
//! goes through the safe-deletion gate: unmanaged events are untouchable
//! no matter what.

use std::path::Path;

use anyhow::Result;
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use calmirror_core::config::SyncConfig;
use calmirror_core::reconcile::build_purge_plan;
use calmirror_core::store::MappingStore;

use crate::apply::apply_plan;
use crate::calendar::CalendarDir;
use crate::render::render_plan;

pub fn run(dir: &Path, force: bool) -> Result<()> {
    let config = SyncConfig::load(dir)?;

    let target = CalendarDir::open(&config.target, &config.target_calendar_id)?;
    let targets = target.target_events()?;
    let store = MappingStore::open(&config.target);
    let mut mappings = store.load()?;

    let plan = build_purge_plan(&config, &targets, &mappings);

    println!("📅 {}", config.name);
    println!("{}", render_plan(&plan, true));
    if plan.is_empty() {
        return Ok(());
    }

    let (_, _, deleted) = plan.counts();
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} mirrored event(s) from '{}'?",
                deleted, config.target_calendar_id
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Aborted".dimmed());
            return Ok(());
        }
    }

    let now = chrono::Utc::now();
    let summary = apply_plan(&plan, &target, &store, &mut mappings, &config.name, now)?;
    println!("\nPurged: {summary}");
    Ok(())
}
