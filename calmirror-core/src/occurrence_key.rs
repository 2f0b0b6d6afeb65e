//! Stable identity keys for source occurrences.
//!
//! The key is the join point between the source snapshot, the mapping
//! table and previously created target events, so it must come out
//! identical across runs and machines regardless of local timezone.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one source occurrence: `sourceId|isoInstant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccurrenceKey {
    pub source_id: String,
    /// UTC ISO-8601, seconds precision, no sub-seconds (e.g. `2025-03-20T15:00:00Z`)
    pub instant_iso: String,
}

impl OccurrenceKey {
    /// Derive the key for an occurrence.
    ///
    /// Prefers the occurrence instant (recurring instance marker), falls
    /// back to the event start, and finally to `now` for the degenerate
    /// case of a one-off event with no start. Total: always returns a key.
    pub fn derive(
        source_id: &str,
        occurrence_instant: Option<DateTime<Utc>>,
        fallback_start: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let instant = occurrence_instant.or(fallback_start).unwrap_or(now);
        OccurrenceKey {
            source_id: source_id.to_string(),
            instant_iso: format_instant(instant),
        }
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.source_id, self.instant_iso)
    }
}

/// Normalize an instant to the canonical key form.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}
