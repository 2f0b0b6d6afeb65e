//! Inclusion/exclusion rules for source occurrences.
//!
//! Rules form an unordered conjunction: an occurrence is synced only if
//! every configured rule passes. A single failing rule short-circuits to
//! rejection.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::event::{Availability, Occurrence};
use crate::marker::Marker;

/// One configured filter rule.
///
/// `pattern` is a literal substring unless `regex` is set. Kinds that take
/// no pattern (all-day, repeating, availability) leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub kind: FilterKind,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub regex: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    TitleIncludes,
    TitleExcludes,
    LocationIncludes,
    LocationExcludes,
    NotesInclude,
    NotesExclude,
    OrganizerIncludes,
    OrganizerExcludes,
    AttendeeIncludes,
    AttendeeExcludes,
    /// Pattern is a threshold in whole minutes
    MinDurationMinutes,
    /// Pattern is a threshold in whole minutes
    MaxDurationMinutes,
    AllDayOnly,
    ExcludeAllDay,
    /// All-day events that don't block time are skipped
    ExcludeFreeAllDay,
    RepeatingOnly,
    ExcludeRepeating,
    BusyOnly,
    FreeOnly,
    /// Skip occurrences carrying a recognized marker owned by a different sync
    IgnoreOtherSyncOwned,
    /// Skip occurrences carrying any recognized marker, regardless of owner
    IgnoreAnySyncOwned,
}

/// Evaluate the full rule list against one occurrence.
pub fn passes(occurrence: &Occurrence, rules: &[FilterRule], owner_tag: &str) -> bool {
    for rule in rules {
        if !rule_passes(occurrence, rule, owner_tag) {
            trace!(
                source_event_id = %occurrence.source_event_id,
                kind = ?rule.kind,
                "occurrence rejected by filter rule"
            );
            return false;
        }
    }
    true
}

fn rule_passes(occ: &Occurrence, rule: &FilterRule, owner_tag: &str) -> bool {
    match rule.kind {
        FilterKind::TitleIncludes => matches_or_fail(Some(&occ.title), rule),
        FilterKind::TitleExcludes => excludes(Some(&occ.title), rule),
        FilterKind::LocationIncludes => matches_or_fail(occ.location.as_deref(), rule),
        FilterKind::LocationExcludes => excludes(occ.location.as_deref(), rule),
        FilterKind::NotesInclude => matches_or_fail(occ.notes.as_deref(), rule),
        FilterKind::NotesExclude => excludes(occ.notes.as_deref(), rule),
        FilterKind::OrganizerIncludes => {
            any_matches_or_fail(organizer_texts(occ).into_iter(), rule)
        }
        FilterKind::OrganizerExcludes => {
            none_match(organizer_texts(occ).into_iter(), rule)
        }
        FilterKind::AttendeeIncludes => any_matches_or_fail(attendee_texts(occ).into_iter(), rule),
        FilterKind::AttendeeExcludes => none_match(attendee_texts(occ).into_iter(), rule),
        FilterKind::MinDurationMinutes => match (occ.duration_minutes(), parse_minutes(rule)) {
            (Some(duration), Some(threshold)) => duration >= threshold,
            // Missing duration or unparseable threshold: rule is a no-op
            _ => true,
        },
        FilterKind::MaxDurationMinutes => match (occ.duration_minutes(), parse_minutes(rule)) {
            (Some(duration), Some(threshold)) => duration <= threshold,
            _ => true,
        },
        FilterKind::AllDayOnly => occ.all_day,
        FilterKind::ExcludeAllDay => !occ.all_day,
        FilterKind::ExcludeFreeAllDay => {
            !(occ.all_day && occ.availability == Availability::Free)
        }
        FilterKind::RepeatingOnly => occ.repeating,
        FilterKind::ExcludeRepeating => !occ.repeating,
        FilterKind::BusyOnly => occ.availability == Availability::Busy,
        FilterKind::FreeOnly => occ.availability == Availability::Free,
        FilterKind::IgnoreOtherSyncOwned => {
            match Marker::decode(occ.notes.as_deref(), occ.url.as_deref()) {
                Some(marker) => marker.owner.is_none() || marker.owned_by(owner_tag),
                None => true,
            }
        }
        FilterKind::IgnoreAnySyncOwned => {
            Marker::decode(occ.notes.as_deref(), occ.url.as_deref()).is_none()
        }
    }
}

/// Pattern match against one text. `None` means the pattern itself was
/// unusable (invalid regex), which fails the rule no matter its polarity.
fn matches(text: &str, rule: &FilterRule) -> Option<bool> {
    if rule.regex {
        let re = RegexBuilder::new(&rule.pattern)
            .case_insensitive(!rule.case_sensitive)
            .build()
            .ok()?;
        Some(re.is_match(text))
    } else if rule.case_sensitive {
        Some(text.contains(&rule.pattern))
    } else {
        Some(text.to_lowercase().contains(&rule.pattern.to_lowercase()))
    }
}

/// Include rule: the field must be present and match.
fn matches_or_fail(text: Option<&str>, rule: &FilterRule) -> bool {
    text.and_then(|t| matches(t, rule)).unwrap_or(false)
}

/// Exclude rule: an absent field can't contain the pattern, so it passes.
/// An invalid regex still fails the rule.
fn excludes(text: Option<&str>, rule: &FilterRule) -> bool {
    match text {
        None => true,
        Some(t) => matches(t, rule).map(|m| !m).unwrap_or(false),
    }
}

fn any_matches_or_fail<'a>(texts: impl Iterator<Item = &'a str>, rule: &FilterRule) -> bool {
    let mut any = false;
    for t in texts {
        match matches(t, rule) {
            Some(true) => any = true,
            Some(false) => {}
            None => return false,
        }
    }
    any
}

fn none_match<'a>(texts: impl Iterator<Item = &'a str>, rule: &FilterRule) -> bool {
    for t in texts {
        match matches(t, rule) {
            Some(true) => return false,
            Some(false) => {}
            None => return false,
        }
    }
    true
}

fn organizer_texts(occ: &Occurrence) -> Vec<&str> {
    let mut texts = Vec::new();
    if let Some(ref org) = occ.organizer {
        texts.push(org.email.as_str());
        if let Some(ref name) = org.name {
            texts.push(name.as_str());
        }
    }
    texts
}

fn attendee_texts(occ: &Occurrence) -> Vec<&str> {
    let mut texts = Vec::new();
    for attendee in &occ.attendees {
        texts.push(attendee.email.as_str());
        if let Some(ref name) = attendee.name {
            texts.push(name.as_str());
        }
    }
    texts
}

fn parse_minutes(rule: &FilterRule) -> Option<i64> {
    rule.pattern.trim().parse().ok()
}
