//! Per-weekday allowed start-time windows.
//!
//! The timezone is an explicit parameter so that window evaluation is
//! deterministic in tests and independent of the machine's locale.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One allowed interval of start times on a given weekday.
///
/// The interval is half-open: a start exactly at `end` is outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Whether an occurrence start is inside any configured window.
///
/// No windows means no restriction. With windows configured, all-day
/// events and events without a start are rejected: they carry no
/// comparable time of day.
pub fn allowed(
    start: Option<DateTime<Utc>>,
    all_day: bool,
    windows: &[TimeWindow],
    tz: Tz,
) -> bool {
    if windows.is_empty() {
        return true;
    }
    if all_day {
        return false;
    }
    let Some(start) = start else {
        return false;
    };

    let local = start.with_timezone(&tz);
    let weekday = local.weekday();
    let time = local.time();

    windows
        .iter()
        .filter(|w| w.weekday == weekday)
        .any(|w| time >= w.start && time < w.end)
}
