//! RRULE expansion for recurring source events.
//!
//! Expands a recurring master into per-instance [`Occurrence`]s within
//! the sync horizon, honoring EXDATEs and instance overrides.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;

use crate::error::{CalMirrorError, CalMirrorResult};
use crate::event::{CalendarEvent, Occurrence, Recurrence};
use crate::occurrence_key::format_instant;

/// Build an iCalendar-format RRULE block for the rrule crate parser.
///
/// All instants are already UTC by the time events reach this point
/// (all-day events sit at midnight UTC), so the block is UTC throughout.
fn build_rrule_string(start: DateTime<Utc>, recurrence: &Recurrence) -> String {
    let mut lines = Vec::new();
    lines.push(format!("DTSTART:{}", start.format("%Y%m%dT%H%M%SZ")));
    lines.push(format!("RRULE:{}", recurrence.rrule));
    for exdate in &recurrence.exdates {
        lines.push(format!("EXDATE:{}", exdate.format("%Y%m%dT%H%M%SZ")));
    }
    lines.join("\n")
}

/// Expand a recurring master into instances with starts in `[from, to)`.
///
/// `overrides` maps occurrence instants (key form) to override events
/// (RECURRENCE-ID exceptions); an override replaces the generated
/// instance for its slot. The master itself is not an occurrence.
pub fn expand_recurring_event(
    master: &CalendarEvent,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    overrides: &HashMap<String, CalendarEvent>,
) -> CalMirrorResult<Vec<Occurrence>> {
    let Some(ref recurrence) = master.recurrence else {
        return Ok(Vec::new());
    };
    let Some(start) = master.start else {
        // A recurring master without a start can't anchor any instances
        return Ok(Vec::new());
    };

    let rrule_str = build_rrule_string(start, recurrence);
    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        CalMirrorError::IcsParse(format!(
            "Failed to parse RRULE for event '{}': {}",
            master.uid, e
        ))
    })?;

    // after/before are exclusive; widen by a second, then enforce the
    // half-open horizon explicitly below
    let tz: rrule::Tz = Utc.into();
    let after = (from - Duration::seconds(1)).with_timezone(&tz);
    let before = to.with_timezone(&tz);
    let result = rrule_set.after(after).before(before).all(365);

    let duration = match (master.start, master.end) {
        (Some(s), Some(e)) => e - s,
        _ => Duration::zero(),
    };

    let mut occurrences = Vec::new();

    for occ_dt in &result.dates {
        let instant = occ_dt.with_timezone(&Utc);
        if instant < from || instant >= to {
            continue;
        }

        if let Some(override_event) = overrides.get(&format_instant(instant)) {
            occurrences.push(occurrence_from_override(override_event, instant));
        } else {
            occurrences.push(Occurrence {
                source_event_id: master.uid.clone(),
                occurrence_instant: Some(instant),
                start: Some(instant),
                end: Some(instant + duration),
                title: master.title.clone(),
                location: master.location.clone(),
                notes: master.notes.clone(),
                url: master.url.clone(),
                organizer: master.organizer.clone(),
                attendees: master.attendees.clone(),
                all_day: master.all_day,
                repeating: true,
                availability: master.availability,
            });
        }
    }

    Ok(occurrences)
}

/// Instance exception: content from the override, identity from the
/// original slot so the occurrence key survives the edit.
fn occurrence_from_override(event: &CalendarEvent, original_instant: DateTime<Utc>) -> Occurrence {
    Occurrence {
        source_event_id: event.uid.clone(),
        occurrence_instant: Some(event.recurrence_id.unwrap_or(original_instant)),
        start: event.start,
        end: event.end,
        title: event.title.clone(),
        location: event.location.clone(),
        notes: event.notes.clone(),
        url: event.url.clone(),
        organizer: event.organizer.clone(),
        attendees: event.attendees.clone(),
        all_day: event.all_day,
        repeating: true,
        availability: event.availability,
    }
}

impl Occurrence {
    /// The single occurrence of a non-recurring event.
    pub fn from_single(event: &CalendarEvent) -> Occurrence {
        Occurrence {
            source_event_id: event.uid.clone(),
            occurrence_instant: event.recurrence_id,
            start: event.start,
            end: event.end,
            title: event.title.clone(),
            location: event.location.clone(),
            notes: event.notes.clone(),
            url: event.url.clone(),
            organizer: event.organizer.clone(),
            attendees: event.attendees.clone(),
            all_day: event.all_day,
            repeating: false,
            availability: event.availability,
        }
    }
}
