//! Mapping rows: the authoritative link from source occurrences to the
//! target events created for them.
//!
//! The engine only ever reasons over a mapping snapshot passed in; the
//! store adapter owns read/write timing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::occurrence_key::OccurrenceKey;

/// One persisted source-occurrence → target-event link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    /// Which sync owns this row
    pub sync_id: String,
    pub source_event_id: String,
    /// Occurrence instant in key form (UTC ISO-8601, seconds precision)
    pub occurrence_iso: String,
    pub target_event_id: String,
    pub last_updated: DateTime<Utc>,
}

impl MappingRow {
    pub fn new(
        sync_id: &str,
        key: &OccurrenceKey,
        target_event_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        MappingRow {
            sync_id: sync_id.to_string(),
            source_event_id: key.source_id.clone(),
            occurrence_iso: key.instant_iso.clone(),
            target_event_id: target_event_id.to_string(),
            last_updated: now,
        }
    }

    /// Join key, same form as [`OccurrenceKey`]'s string rendering.
    pub fn key(&self) -> String {
        format!("{}|{}", self.source_event_id, self.occurrence_iso)
    }
}

/// Rows belonging to `sync_id`, sorted by key for deterministic iteration.
pub fn rows_for_sync<'a>(rows: &'a [MappingRow], sync_id: &str) -> Vec<&'a MappingRow> {
    let mut scoped: Vec<&MappingRow> = rows.iter().filter(|r| r.sync_id == sync_id).collect();
    scoped.sort_by_key(|r| r.key());
    scoped
}
