//! The plan builder: pure reconciliation of source occurrences against
//! target state.
//!
//! Deterministic function of its input snapshots. No I/O, no ambient
//! clock, no shared state: the surrounding apply step owns all side
//! effects, and a crash mid-apply just means the next run re-derives
//! whatever is missing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::{SyncConfig, SyncMode};
use crate::error::CalMirrorResult;
use crate::event::{Availability, EventDraft, Occurrence, TargetEvent};
use crate::filter;
use crate::mapping::{self, MappingRow};
use crate::marker::{self, Marker};
use crate::matcher;
use crate::occurrence_key::OccurrenceKey;
use crate::plan::{Action, ActionKind, Plan};
use crate::safety;
use crate::time_window;

/// The four snapshots reconciliation runs over, taken atomically by the
/// calendar adapter before the engine runs.
#[derive(Debug)]
pub struct ReconcileInput<'a> {
    pub config: &'a SyncConfig,
    /// Source occurrences for the horizon, in snapshot order
    pub source: &'a [Occurrence],
    /// Every event currently in the target calendar
    pub targets: &'a [TargetEvent],
    /// Mapping rows; rows of other syncs are ignored
    pub mappings: &'a [MappingRow],
    pub now: DateTime<Utc>,
}

/// Compute the minimal create/update/delete plan for one sync cycle.
///
/// Creates and updates come out in source-iteration order, deletes are
/// appended in mapping-key order, so equal inputs always yield an equal
/// plan.
pub fn build_plan(input: &ReconcileInput) -> CalMirrorResult<Plan> {
    let config = input.config;
    let tz = config.tz()?;

    let scoped_rows = mapping::rows_for_sync(input.mappings, &config.name);
    let rows_by_key: HashMap<String, &MappingRow> =
        scoped_rows.iter().map(|r| (r.key(), *r)).collect();
    let targets_by_id: HashMap<&str, &TargetEvent> =
        input.targets.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut plan = Plan::default();
    let mut live_keys: HashSet<String> = HashSet::new();

    for occ in input.source {
        if !filter::passes(occ, &config.filters, &config.name) {
            continue;
        }
        if !time_window::allowed(occ.start, occ.all_day, &config.windows, tz) {
            continue;
        }

        let key = OccurrenceKey::derive(
            &occ.source_event_id,
            occ.occurrence_instant,
            occ.start,
            input.now,
        );
        if !live_keys.insert(key.to_string()) {
            // Two source occurrences collapsing to one key would otherwise
            // produce duplicate creates against a single twin
            warn!(key = %key, "duplicate occurrence key in source snapshot, skipping");
            continue;
        }

        let draft = build_draft(occ, config, &key);
        let twin = matcher::resolve_twin(
            &key,
            &draft.title,
            occ.start,
            &config.name,
            &rows_by_key,
            &targets_by_id,
            input.targets,
        );

        match twin {
            None => plan.actions.push(Action {
                kind: ActionKind::Create,
                key: key.to_string(),
                occurrence: Some(occ.clone()),
                target: None,
                draft: Some(draft),
                reason: "no target twin exists yet".to_string(),
            }),
            Some(twin) => {
                let changed = changed_fields(&config.mode, &draft, twin);
                if changed.is_empty() {
                    continue;
                }
                plan.actions.push(Action {
                    kind: ActionKind::Update,
                    key: key.to_string(),
                    occurrence: Some(occ.clone()),
                    target: Some(twin.clone()),
                    draft: Some(draft),
                    reason: format!("fields differ: {}", changed.join(", ")),
                });
            }
        }
    }

    // Mapping rows whose key is no longer live are cleanup candidates.
    // This includes occurrences that are now filtered out: their twins
    // must not linger in the target calendar.
    for row in scoped_rows {
        let key = row.key();
        if live_keys.contains(&key) {
            continue;
        }

        match targets_by_id.get(row.target_event_id.as_str()) {
            Some(target) => {
                let marker = Marker::decode(target.notes.as_deref(), target.url.as_deref());
                if safety::may_delete(
                    &config.target_calendar_id,
                    &target.calendar_id,
                    marker.as_ref(),
                    true,
                ) {
                    plan.actions.push(Action {
                        kind: ActionKind::Delete,
                        key,
                        occurrence: None,
                        target: Some((*target).clone()),
                        draft: None,
                        reason: "source occurrence is gone".to_string(),
                    });
                } else {
                    // Fail-closed: leave both the event and its row alone
                    debug!(key = %key, "delete suppressed by safety policy");
                }
            }
            // Twin already gone from the target calendar; only the row is left
            None => plan.orphaned_mapping_keys.push(key),
        }
    }

    Ok(plan)
}

/// Plan the deletion of every event this sync manages, bypassing the
/// create/update path. Each candidate still goes through the safety gate.
pub fn build_purge_plan(
    config: &SyncConfig,
    targets: &[TargetEvent],
    mappings: &[MappingRow],
) -> Plan {
    let targets_by_id: HashMap<&str, &TargetEvent> =
        targets.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut plan = Plan::default();

    for row in mapping::rows_for_sync(mappings, &config.name) {
        let key = row.key();
        match targets_by_id.get(row.target_event_id.as_str()) {
            Some(target) => {
                let marker = Marker::decode(target.notes.as_deref(), target.url.as_deref());
                if safety::may_delete(
                    &config.target_calendar_id,
                    &target.calendar_id,
                    marker.as_ref(),
                    true,
                ) {
                    plan.actions.push(Action {
                        kind: ActionKind::Delete,
                        key,
                        occurrence: None,
                        target: Some((*target).clone()),
                        draft: None,
                        reason: "purge".to_string(),
                    });
                } else {
                    debug!(key = %key, "purge delete suppressed by safety policy");
                }
            }
            None => plan.orphaned_mapping_keys.push(key),
        }
    }

    plan
}

/// Desired target content for an occurrence, marker included.
fn build_draft(occ: &Occurrence, config: &SyncConfig, key: &OccurrenceKey) -> EventDraft {
    let marker_text = Marker::for_occurrence(&config.name, key).encode();

    match &config.mode {
        SyncMode::Full => {
            // Strip any foreign marker from the source notes so the twin
            // decodes to exactly one owner: us
            let notes = match occ.notes.as_deref().map(marker::strip_markers) {
                Some(stripped) if !stripped.is_empty() => {
                    format!("{stripped}\n\n{marker_text}")
                }
                _ => marker_text,
            };
            EventDraft {
                title: occ.title.clone(),
                start: occ.start,
                end: occ.end,
                location: occ.location.clone(),
                notes: Some(notes),
                url: occ.url.clone(),
                all_day: occ.all_day,
                availability: occ.availability,
            }
        }
        mode @ SyncMode::Blocker { .. } => EventDraft {
            title: mode.render_title(&occ.title),
            start: occ.start,
            end: occ.end,
            location: None,
            notes: Some(marker_text),
            url: None,
            all_day: occ.all_day,
            availability: Availability::Busy,
        },
    }
}

/// Mode-relevant fields that differ between desired and actual state.
///
/// Equality is exact: instant-for-instant on times, byte-for-byte on
/// strings. No tolerance window.
fn changed_fields(mode: &SyncMode, draft: &EventDraft, twin: &TargetEvent) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if draft.title != twin.title {
        changed.push("title");
    }
    if draft.start != twin.start {
        changed.push("start");
    }
    if draft.end != twin.end {
        changed.push("end");
    }
    // Blocker twins carry no location worth preserving
    if matches!(mode, SyncMode::Full) && draft.location != twin.location {
        changed.push("location");
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::MappingDelta;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn config() -> SyncConfig {
        SyncConfig {
            name: "work-mirror".to_string(),
            source: PathBuf::from("/src"),
            target: PathBuf::from("/tgt"),
            target_calendar_id: "personal".to_string(),
            mode: SyncMode::Full,
            horizon_days: 30,
            timezone: "UTC".to_string(),
            filters: vec![],
            windows: vec![],
            interval: None,
        }
    }

    fn monday_9() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 17, 9, 0, 0).unwrap()
    }

    fn standup() -> Occurrence {
        Occurrence {
            source_event_id: "src-standup".to_string(),
            occurrence_instant: None,
            start: Some(monday_9()),
            end: Some(Utc.with_ymd_and_hms(2025, 3, 17, 9, 30, 0).unwrap()),
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

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 16, 12, 0, 0).unwrap()
    }

    /// Pretend-apply a plan: turn creates into target events + mapping
    /// rows, updates into rewritten targets, deletes into removals.
    fn apply_in_memory(
        plan: &Plan,
        config: &SyncConfig,
        targets: &mut Vec<TargetEvent>,
        mappings: &mut Vec<MappingRow>,
    ) {
        for (i, action) in plan.actions.iter().enumerate() {
            match action.kind {
                ActionKind::Create => {
                    let draft = action.draft.as_ref().unwrap();
                    let id = format!("tgt-{i}");
                    targets.push(TargetEvent {
                        id: id.clone(),
                        calendar_id: config.target_calendar_id.clone(),
                        title: draft.title.clone(),
                        start: draft.start,
                        end: draft.end,
                        location: draft.location.clone(),
                        notes: draft.notes.clone(),
                        url: draft.url.clone(),
                        all_day: draft.all_day,
                        availability: draft.availability,
                        last_updated: Some(now()),
                    });
                    let (src, iso) = action.key.split_once('|').unwrap();
                    mappings.push(MappingRow {
                        sync_id: config.name.clone(),
                        source_event_id: src.to_string(),
                        occurrence_iso: iso.to_string(),
                        target_event_id: id,
                        last_updated: now(),
                    });
                }
                ActionKind::Update => {
                    let draft = action.draft.as_ref().unwrap();
                    let id = &action.target.as_ref().unwrap().id;
                    let target = targets.iter_mut().find(|t| &t.id == id).unwrap();
                    target.title = draft.title.clone();
                    target.start = draft.start;
                    target.end = draft.end;
                    target.location = draft.location.clone();
                    target.notes = draft.notes.clone();
                }
                ActionKind::Delete => {
                    let id = action.target.as_ref().unwrap().id.clone();
                    targets.retain(|t| t.id != id);
                    mappings.retain(|r| r.key() != action.key);
                }
            }
        }
        for key in &plan.orphaned_mapping_keys {
            mappings.retain(|r| &r.key() != key);
        }
    }

    #[test]
    fn test_new_occurrence_yields_one_create() {
        let config = config();
        let source = vec![standup()];
        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &[],
            mappings: &[],
            now: now(),
        })
        .unwrap();

        assert_eq!(plan.counts(), (1, 0, 0));
        let action = &plan.actions[0];
        assert_eq!(action.key, "src-standup|2025-03-17T09:00:00Z");
        let draft = action.draft.as_ref().unwrap();
        assert!(draft.notes.as_ref().unwrap().contains("calmirror:v1"));
        assert!(matches!(
            plan.mapping_deltas()[0],
            MappingDelta::InsertAfterCreate { .. }
        ));
    }

    #[test]
    fn test_matching_twin_yields_empty_plan() {
        let config = config();
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        // Idempotence: the second run over applied state plans nothing
        let second = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert!(second.is_empty(), "expected empty plan, got {:?}", second.actions);
    }

    #[test]
    fn test_locally_changed_twin_yields_one_update() {
        let config = config();
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        targets[0].title = "Standup (edited)".to_string();

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert_eq!(plan.counts(), (0, 1, 0));
        assert!(plan.actions[0].reason.contains("title"));
    }

    #[test]
    fn test_removed_source_yields_one_delete() {
        let config = config();
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &[],
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert_eq!(plan.counts(), (0, 0, 1));
        assert_eq!(plan.actions[0].key, "src-standup|2025-03-17T09:00:00Z");
    }

    #[test]
    fn test_moved_twin_suppresses_delete() {
        let config = config();
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        // User moved the twin to another calendar; source is gone
        targets[0].calendar_id = "inbox".to_string();

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &[],
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert_eq!(plan.counts(), (0, 0, 0));
        // The row stays too, in case the event comes back
        assert!(plan.orphaned_mapping_keys.is_empty());
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn test_identifier_rotation_yields_no_create() {
        let config = config();
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        // Provider rotated the identifier; marker and content unchanged
        targets[0].id = "tgt-rotated".to_string();

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        let (created, _, _) = plan.counts();
        assert_eq!(created, 0, "rotation must not duplicate the twin");
    }

    #[test]
    fn test_filtered_out_occurrence_is_cleaned_up() {
        let mut config = config();
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        // The occurrence still exists but a new rule now excludes it
        config.filters.push(crate::filter::FilterRule {
            kind: crate::filter::FilterKind::TitleExcludes,
            pattern: "standup".to_string(),
            case_sensitive: false,
            regex: false,
        });

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert_eq!(plan.counts(), (0, 0, 1));
    }

    #[test]
    fn test_orphaned_mapping_row_is_dropped_without_delete() {
        let config = config();
        let key = OccurrenceKey::derive("src-gone", None, Some(monday_9()), now());
        let mappings = vec![MappingRow::new(&config.name, &key, "tgt-gone", now())];

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &[],
            targets: &[],
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert_eq!(plan.counts(), (0, 0, 0));
        assert_eq!(plan.orphaned_mapping_keys, vec![key.to_string()]);
    }

    #[test]
    fn test_other_syncs_rows_are_untouched() {
        let config = config();
        let key = OccurrenceKey::derive("src-x", None, Some(monday_9()), now());
        let mappings = vec![MappingRow::new("another-sync", &key, "tgt-x", now())];

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &[],
            targets: &[],
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_blocker_mode_renders_template_and_hides_details() {
        let mut config = config();
        config.mode = SyncMode::Blocker {
            title_template: "Busy ({sourceTitle})".to_string(),
        };
        let mut occ = standup();
        occ.location = Some("War room".to_string());
        occ.availability = Availability::Free;

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &[occ],
            targets: &[],
            mappings: &[],
            now: now(),
        })
        .unwrap();
        let draft = plan.actions[0].draft.as_ref().unwrap();
        assert_eq!(draft.title, "Busy (Standup)");
        assert_eq!(draft.location, None);
        assert_eq!(draft.availability, Availability::Busy);
    }

    #[test]
    fn test_blocker_mode_ignores_location_changes() {
        let mut config = config();
        config.mode = SyncMode::Blocker {
            title_template: "Busy".to_string(),
        };
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        // A stray location on the twin is not a mode-relevant difference
        targets[0].location = Some("scribbled by hand".to_string());

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_window_rejection_skips_occurrence() {
        let mut config = config();
        config.windows = vec![crate::time_window::TimeWindow {
            weekday: chrono::Weekday::Mon,
            start: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }];

        // Starts 09:00, window opens 10:00
        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &[standup()],
            targets: &[],
            mappings: &[],
            now: now(),
        })
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_duplicate_keys_create_once() {
        let config = config();
        let source = vec![standup(), standup()];

        let plan = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &[],
            mappings: &[],
            now: now(),
        })
        .unwrap();
        assert_eq!(plan.counts(), (1, 0, 0));
    }

    #[test]
    fn test_purge_deletes_all_managed_events_and_nothing_else() {
        let config = config();
        let source = vec![standup()];

        let mut targets = Vec::new();
        let mut mappings = Vec::new();
        let first = build_plan(&ReconcileInput {
            config: &config,
            source: &source,
            targets: &targets,
            mappings: &mappings,
            now: now(),
        })
        .unwrap();
        apply_in_memory(&first, &config, &mut targets, &mut mappings);

        // An unmanaged event sharing the calendar
        targets.push(TargetEvent {
            id: "user-own".to_string(),
            calendar_id: config.target_calendar_id.clone(),
            title: "Dentist".to_string(),
            start: Some(monday_9()),
            end: None,
            location: None,
            notes: None,
            url: None,
            all_day: false,
            availability: Availability::Busy,
            last_updated: None,
        });

        let plan = build_purge_plan(&config, &targets, &mappings);
        assert_eq!(plan.counts(), (0, 0, 1));
        assert_eq!(plan.actions[0].target.as_ref().unwrap().id, "tgt-0");
    }
}
