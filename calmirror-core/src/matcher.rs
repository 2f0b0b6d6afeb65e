//! Twin resolution: finding the target event that mirrors a source
//! occurrence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::event::TargetEvent;
use crate::mapping::MappingRow;
use crate::marker::Marker;
use crate::occurrence_key::OccurrenceKey;

/// Resolve the target twin for one source occurrence.
///
/// Primary path: mapping row for the key, identifier present in the
/// target snapshot. Fallback path (identifier-rotation resilience): a
/// marker-tagged target whose (title, start) pair matches. The fallback
/// trades a small risk of adopting an identical-looking stranger against
/// the much larger risk of duplicating events after identifier churn.
///
/// `expected_title` is the mode-rendered title, so blocker-mode twins are
/// matched on the title they were actually created with. When several
/// candidates tie, the lexicographically smallest identifier wins.
pub fn resolve_twin<'a>(
    key: &OccurrenceKey,
    expected_title: &str,
    start: Option<DateTime<Utc>>,
    owner_tag: &str,
    mappings_by_key: &HashMap<String, &MappingRow>,
    targets_by_id: &HashMap<&str, &'a TargetEvent>,
    all_targets: &'a [TargetEvent],
) -> Option<&'a TargetEvent> {
    if let Some(row) = mappings_by_key.get(&key.to_string()) {
        if let Some(target) = targets_by_id.get(row.target_event_id.as_str()) {
            return Some(*target);
        }
        debug!(
            key = %key,
            target_event_id = %row.target_event_id,
            "mapped target missing from snapshot, trying loose match"
        );
    }

    loose_match(expected_title, start, owner_tag, all_targets)
}

/// Loose match among marker-tagged targets on (title, start).
///
/// Only events whose marker either names us as owner or carries no owner
/// field at all are considered; another sync's events are never adopted.
fn loose_match<'a>(
    expected_title: &str,
    start: Option<DateTime<Utc>>,
    owner_tag: &str,
    all_targets: &'a [TargetEvent],
) -> Option<&'a TargetEvent> {
    let start = start?;

    all_targets
        .iter()
        .filter(|t| t.title == expected_title && t.start == Some(start))
        .filter(|t| {
            match Marker::decode(t.notes.as_deref(), t.url.as_deref()) {
                Some(marker) => marker.owner.is_none() || marker.owned_by(owner_tag),
                None => false,
            }
        })
        .min_by(|a, b| a.id.cmp(&b.id))
}
