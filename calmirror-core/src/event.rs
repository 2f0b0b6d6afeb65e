//! Calendar-neutral event types.
//!
//! These types represent events the way the reconciliation engine sees them:
//! the calendar adapter converts raw `.ics` files into these, and all engine
//! logic works exclusively with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw calendar event as read from a calendar directory.
///
/// Recurring masters carry a `recurrence`; instance overrides carry a
/// `recurrence_id`. Both are resolved into [`Occurrence`]s before the
/// engine ever sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub uid: String,
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub organizer: Option<Attendee>,
    pub attendees: Vec<Attendee>,
    pub availability: Availability,
    /// RRULE + EXDATEs for recurring masters
    pub recurrence: Option<Recurrence>,
    /// Original instance start for overrides of recurring events
    pub recurrence_id: Option<DateTime<Utc>>,
    /// Last modification timestamp (LAST-MODIFIED)
    pub last_updated: Option<DateTime<Utc>>,
}

/// One concrete instance of a (possibly recurring) source event.
///
/// Produced fresh each run from the source snapshot; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Identifier of the owning source event
    pub source_event_id: String,
    /// Instance start for recurring instances; None for one-off events
    pub occurrence_instant: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub title: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub organizer: Option<Attendee>,
    pub attendees: Vec<Attendee>,
    pub all_day: bool,
    pub repeating: bool,
    pub availability: Availability,
}

impl Occurrence {
    /// Event length in whole minutes, when both bounds are known.
    pub fn duration_minutes(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some((e - s).num_minutes()),
            _ => None,
        }
    }
}

/// An event in the target calendar, as captured in the target snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEvent {
    pub id: String,
    /// Calendar the event currently lives in (safe-deletion check)
    pub calendar_id: String,
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub all_day: bool,
    pub availability: Availability,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Desired content of a target event, produced by the plan builder.
///
/// The apply step turns a draft into an actual create or update against
/// the target calendar. The ownership marker is already embedded in
/// `notes`/`url` by the time a draft is emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub all_day: bool,
    pub availability: Availability,
}

/// An event attendee (also used for the organizer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    /// Display name
    pub name: Option<String>,
    /// Email address
    pub email: String,
}

/// Whether an event blocks time (busy) or not (free).
///
/// Maps to ICS TRANSP: OPAQUE is busy, TRANSPARENT is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Busy,
    Free,
}

/// RRULE and exception dates for a recurring master event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub rrule: String,
    pub exdates: Vec<DateTime<Utc>>,
}
