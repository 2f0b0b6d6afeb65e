//! The safe-deletion gate.
//!
//! The only thing standing between a one-way sync and silent destruction
//! of a user's unrelated calendar data. When in doubt, leave the event
//! alone.

use crate::marker::Marker;

/// Whether a delete candidate may actually be deleted.
///
/// Requires all of: the event still lives in the configured target
/// calendar, it carries a recognized marker, and a mapping row exists for
/// its key. Any missing condition rejects the deletion.
pub fn may_delete(
    target_calendar_id: &str,
    event_calendar_id: &str,
    marker: Option<&Marker>,
    has_mapping_row: bool,
) -> bool {
    target_calendar_id == event_calendar_id && marker.is_some() && has_mapping_row
}
