//! Plan application against the target calendar.
//!
//! Actions run sequentially. A failed calendar operation is recorded and
//! skipped, never fatal: the untouched mapping row makes the next run
//! re-derive the action. Mapping changes are persisted only after the
//! operation they belong to succeeds, so a crash mid-apply leaves the
//! table consistent with whatever actually happened on disk.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use calmirror_core::mapping::MappingRow;
use calmirror_core::occurrence_key::OccurrenceKey;
use calmirror_core::plan::{Action, ActionKind, Plan, RunSummary};
use calmirror_core::store::MappingStore;

use crate::calendar::CalendarDir;

pub fn apply_plan(
    plan: &Plan,
    target: &CalendarDir,
    store: &MappingStore,
    mappings: &mut Vec<MappingRow>,
    sync_id: &str,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for action in &plan.actions {
        match apply_action(action, target, store, mappings, sync_id, now) {
            Ok(()) => match action.kind {
                ActionKind::Create => summary.created += 1,
                ActionKind::Update => summary.updated += 1,
                ActionKind::Delete => summary.deleted += 1,
            },
            Err(e) => {
                // Contained: remaining actions still run, the row stays
                // as it was, and the next cycle re-plans this key
                warn!(key = %action.key, kind = %action.kind, error = %e, "action failed");
                summary.failed += 1;
            }
        }
    }

    if !plan.orphaned_mapping_keys.is_empty() {
        // No calendar call involved; the twin is already gone
        mappings.retain(|row| {
            !(row.sync_id == sync_id && plan.orphaned_mapping_keys.contains(&row.key()))
        });
        store.save(mappings)?;
        debug!(
            count = plan.orphaned_mapping_keys.len(),
            "dropped orphaned mapping rows"
        );
    }

    Ok(summary)
}

fn apply_action(
    action: &Action,
    target: &CalendarDir,
    store: &MappingStore,
    mappings: &mut Vec<MappingRow>,
    sync_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    match action.kind {
        ActionKind::Create => {
            let draft = action
                .draft
                .as_ref()
                .expect("Create action must carry a draft");
            let target_event_id = target.create_event(draft, now)?;
            upsert_row(mappings, sync_id, &action.key, &target_event_id, now);
            store.save(mappings)?;
        }
        ActionKind::Update => {
            let draft = action
                .draft
                .as_ref()
                .expect("Update action must carry a draft");
            let twin = action
                .target
                .as_ref()
                .expect("Update action must carry its target");
            target.update_event(&twin.id, draft, now)?;
            upsert_row(mappings, sync_id, &action.key, &twin.id, now);
            store.save(mappings)?;
        }
        ActionKind::Delete => {
            let twin = action
                .target
                .as_ref()
                .expect("Delete action must carry its target");
            target.delete_event(&twin.id)?;
            mappings.retain(|row| !(row.sync_id == sync_id && row.key() == action.key));
            store.save(mappings)?;
        }
    }
    Ok(())
}

/// Insert or refresh the row for a key. Update doubles as insert so a
/// loose-matched twin (mapping lost, marker intact) gets its row back.
fn upsert_row(
    mappings: &mut Vec<MappingRow>,
    sync_id: &str,
    key: &str,
    target_event_id: &str,
    now: DateTime<Utc>,
) {
    mappings.retain(|row| !(row.sync_id == sync_id && row.key() == key));

    let (source_id, instant_iso) = key
        .split_once('|')
        .expect("occurrence keys always contain a separator");
    mappings.push(MappingRow::new(
        sync_id,
        &OccurrenceKey {
            source_id: source_id.to_string(),
            instant_iso: instant_iso.to_string(),
        },
        target_event_id,
        now,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use calmirror_core::config::{SyncConfig, SyncMode};
    use calmirror_core::event::{Availability, Occurrence};
    use calmirror_core::reconcile::{ReconcileInput, build_plan};
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn config(source: PathBuf, target: PathBuf) -> SyncConfig {
        SyncConfig {
            name: "test-sync".to_string(),
            source,
            target,
            target_calendar_id: "target-cal".to_string(),
            mode: SyncMode::Full,
            horizon_days: 30,
            timezone: "UTC".to_string(),
            filters: vec![],
            windows: vec![],
            interval: None,
        }
    }

    fn occurrence(start: DateTime<Utc>) -> Occurrence {
        Occurrence {
            source_event_id: "src-1".to_string(),
            occurrence_instant: None,
            start: Some(start),
            end: Some(start + chrono::Duration::minutes(30)),
            title: "Standup".to_string(),
            location: None,
            notes: None,
            url: None,
            organizer: None,
            attendees: vec![],
            all_day: false,
            repeating: false,
            availability: Availability::Busy,
        }
    }

    /// Full cycle against real directories: create, then no-op, then delete.
    #[test]
    fn test_apply_then_replan_converges() {
        let source_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let config = config(
            source_dir.path().to_path_buf(),
            target_dir.path().to_path_buf(),
        );

        let target = CalendarDir::open(target_dir.path(), &config.target_calendar_id).unwrap();
        let store = MappingStore::open(target_dir.path());
        let mut mappings = store.load().unwrap();

        let now = Utc.with_ymd_and_hms(2025, 3, 16, 12, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 17, 9, 0, 0).unwrap();
        let source = vec![occurrence(start)];

        // Cycle 1: create
        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &target.target_events().unwrap(),
            mappings: &mappings,
            now,
        })
        .unwrap();
        let summary = apply_plan(&plan, &target, &store, &mut mappings, &config.name, now).unwrap();
        assert_eq!((summary.created, summary.failed), (1, 0));
        assert_eq!(store.load().unwrap().len(), 1);

        // Cycle 2: nothing to do
        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &target.target_events().unwrap(),
            mappings: &mappings,
            now,
        })
        .unwrap();
        assert!(plan.is_empty());

        // Cycle 3: source gone, twin deleted, row dropped
        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &[],
            targets: &target.target_events().unwrap(),
            mappings: &mappings,
            now,
        })
        .unwrap();
        let summary = apply_plan(&plan, &target, &store, &mut mappings, &config.name, now).unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(target.target_events().unwrap().is_empty());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_failed_action_is_contained() {
        let target_dir = tempfile::tempdir().unwrap();
        let target = CalendarDir::open(target_dir.path(), "target-cal").unwrap();
        let store = MappingStore::open(target_dir.path());
        let mut mappings = Vec::new();
        let now = Utc.with_ymd_and_hms(2025, 3, 16, 12, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 17, 9, 0, 0).unwrap();

        // An update whose twin file doesn't exist fails; the create after
        // it still runs
        let config = config(PathBuf::new(), target_dir.path().to_path_buf());
        let source = vec![occurrence(start)];
        let mut plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &[],
            mappings: &[],
            now,
        })
        .unwrap();

        let mut broken = plan.actions[0].clone();
        broken.kind = ActionKind::Update;
        broken.key = "src-ghost|2025-03-17T09:00:00Z".to_string();
        broken.target = Some(calmirror_core::event::TargetEvent {
            id: "ghost".to_string(),
            calendar_id: "target-cal".to_string(),
            title: "Ghost".to_string(),
            start: Some(start),
            end: None,
            location: None,
            notes: None,
            url: None,
            all_day: false,
            availability: Availability::Busy,
            last_updated: None,
        });
        plan.actions.insert(0, broken);

        let summary = apply_plan(&plan, &target, &store, &mut mappings, "test-sync", now).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        // Only the successful create earned a mapping row
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
