//! ICS file generation.

use icalendar::{Calendar, Component, EventLike, Property};

use crate::error::CalMirrorResult;
use crate::event::{Attendee, Availability, CalendarEvent};

/// Generate .ics content for an event.
pub fn generate_ics(event: &CalendarEvent) -> CalMirrorResult<String> {
    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&event.title);

    // DTSTAMP - required by RFC 5545; last_updated when known.
    // Comparison logic never reads this back, so the fallback clock is fine.
    let dtstamp = event
        .last_updated
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y%m%dT%H%M%SZ")
        .to_string();
    ics_event.add_property("DTSTAMP", &dtstamp);

    if let Some(updated) = event.last_updated {
        ics_event.add_property("LAST-MODIFIED", updated.format("%Y%m%dT%H%M%SZ").to_string());
    }

    if let Some(start) = event.start {
        add_instant_property(&mut ics_event, "DTSTART", start, event.all_day);
    }
    if let Some(end) = event.end {
        add_instant_property(&mut ics_event, "DTEND", end, event.all_day);
    }

    if let Some(ref notes) = event.notes {
        ics_event.description(notes);
    }
    if let Some(ref location) = event.location {
        ics_event.location(location);
    }
    if let Some(ref url) = event.url {
        ics_event.add_property("URL", url);
    }

    // TRANSP - only emit if TRANSPARENT (OPAQUE is the default)
    if event.availability == Availability::Free {
        ics_event.add_property("TRANSP", "TRANSPARENT");
    }

    if let Some(ref recurrence) = event.recurrence {
        ics_event.add_property("RRULE", &recurrence.rrule);
        for exdate in &recurrence.exdates {
            let prop = Property::new("EXDATE", exdate.format("%Y%m%dT%H%M%SZ").to_string());
            ics_event.append_multi_property(prop);
        }
    }

    if let Some(recurrence_id) = event.recurrence_id {
        add_instant_property(&mut ics_event, "RECURRENCE-ID", recurrence_id, event.all_day);
    }

    if let Some(ref organizer) = event.organizer {
        ics_event.append_property(attendee_property("ORGANIZER", organizer));
    }
    for attendee in &event.attendees {
        ics_event.append_multi_property(attendee_property("ATTENDEE", attendee));
    }

    let ics_event = ics_event.done();
    cal.push(ics_event);
    let cal = cal.done();

    Ok(rewrite_prodid(&cal.to_string()))
}

/// Stamp our own PRODID over the icalendar crate's default.
fn rewrite_prodid(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:CALMIRROR\r\n");
        } else {
            result.push_str(line);
            result.push_str("\r\n");
        }
    }
    result
}

fn add_instant_property(
    ics_event: &mut icalendar::Event,
    name: &str,
    instant: chrono::DateTime<chrono::Utc>,
    all_day: bool,
) {
    if all_day {
        let mut prop = Property::new(name, instant.format("%Y%m%d").to_string());
        prop.add_parameter("VALUE", "DATE");
        ics_event.append_property(prop);
    } else {
        ics_event.add_property(name, instant.format("%Y%m%dT%H%M%SZ").to_string());
    }
}

fn attendee_property(name: &str, attendee: &Attendee) -> Property {
    let mut prop = Property::new(name, format!("mailto:{}", attendee.email));
    if let Some(ref cn) = attendee.name {
        prop.add_parameter("CN", cn);
    }
    prop
}
