//! ICS file parsing using the icalendar crate's parser.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use icalendar::{
    DatePerhapsTime,
    parser::{Property, read_calendar, unfold},
};

use crate::event::{Attendee, Availability, CalendarEvent, Recurrence};

/// Parse ICS content into a CalendarEvent. Returns None when the content
/// holds no parseable VEVENT.
pub fn parse_event(content: &str) -> Option<CalendarEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();
    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "(No title)".to_string());

    let (start, start_all_day) = match vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
    {
        Some(dpt) => {
            let (dt, all_day) = to_utc_instant(dpt);
            (Some(dt), all_day)
        }
        None => (None, false),
    };
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|dpt| to_utc_instant(dpt).0);

    let location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());
    let notes = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    let url = vevent.find_prop("URL").map(|p| p.val.to_string());

    let availability = vevent
        .find_prop("TRANSP")
        .map(|p| {
            if p.val == "TRANSPARENT" {
                Availability::Free
            } else {
                Availability::Busy
            }
        })
        .unwrap_or(Availability::Busy);

    // Recurrence (RRULE, EXDATE)
    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let exdates: Vec<DateTime<Utc>> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();
    let recurrence = rrule.map(|rrule| Recurrence { rrule, exdates });

    // RECURRENCE-ID for instance overrides
    let recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|dpt| to_utc_instant(dpt).0);

    let organizer = vevent.find_prop("ORGANIZER").map(parse_attendee);
    let attendees: Vec<Attendee> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(parse_attendee)
        .collect();

    let last_updated = vevent
        .find_prop("LAST-MODIFIED")
        .and_then(|p| parse_utc_stamp(p.val.as_ref()));

    Some(CalendarEvent {
        uid,
        title,
        start,
        end,
        all_day: start_all_day,
        location,
        notes,
        url,
        organizer,
        attendees,
        availability,
        recurrence,
        recurrence_id,
        last_updated,
    })
}

/// Flatten icalendar's DatePerhapsTime to a UTC instant plus all-day flag.
///
/// All-day dates become midnight UTC; floating times are taken as UTC;
/// zoned times convert through chrono-tz, falling back to UTC when the
/// TZID is unknown.
fn to_utc_instant(dpt: DatePerhapsTime) -> (DateTime<Utc>, bool) {
    match dpt {
        DatePerhapsTime::Date(d) => (d.and_hms_opt(0, 0, 0).unwrap().and_utc(), true),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => (dt, false),
            icalendar::CalendarDateTime::Floating(naive) => (naive.and_utc(), false),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                (zoned_to_utc(date_time, &tzid), false)
            }
        },
    }
}

fn zoned_to_utc(naive: NaiveDateTime, tzid: &str) -> DateTime<Utc> {
    match tzid.parse::<Tz>() {
        Ok(tz) => naive
            .and_local_timezone(tz)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
        Err(_) => naive.and_utc(),
    }
}

/// Parse an EXDATE property into UTC instants.
///
/// Handles TZID parameters, VALUE=DATE, UTC and floating forms, and
/// comma-separated value lists.
fn parse_exdate_property(prop: &Property) -> Vec<DateTime<Utc>> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_date {
                chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc())
            } else if let Some(ref tz) = tzid {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| zoned_to_utc(dt, tz))
            } else if let Some(stripped) = s.strip_suffix('Z') {
                NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            } else {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            }
        })
        .collect()
}

/// Parse ATTENDEE/ORGANIZER property
fn parse_attendee(prop: &Property) -> Attendee {
    let email = prop
        .val
        .as_ref()
        .strip_prefix("mailto:")
        .unwrap_or(prop.val.as_ref())
        .to_string();

    let name = prop
        .params
        .iter()
        .find(|p| p.key == "CN")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    Attendee { name, email }
}

/// Parse a UTC timestamp like 20250317T090000Z
fn parse_utc_stamp(value: &str) -> Option<DateTime<Utc>> {
    let stripped = value.strip_suffix('Z')?;
    NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}
