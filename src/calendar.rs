//! Calendar directory access.
//!
//! A calendar is a directory of `.ics` files, one VEVENT per file. This
//! adapter produces the snapshots the engine consumes and applies the
//! engine's actions back to disk. The engine itself never touches the
//! filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calmirror_core::error::{CalMirrorError, CalMirrorResult};
use calmirror_core::event::{CalendarEvent, EventDraft, Occurrence, TargetEvent};
use calmirror_core::ics::{generate_ics, parse_event};
use calmirror_core::occurrence_key::format_instant;
use calmirror_core::recurrence::expand_recurring_event;
use chrono::{DateTime, Utc};

pub struct CalendarDir {
    pub path: PathBuf,
    pub calendar_id: String,
}

impl CalendarDir {
    pub fn open(path: &Path, calendar_id: &str) -> CalMirrorResult<Self> {
        if !path.is_dir() {
            return Err(CalMirrorError::CalendarNotFound(path.display().to_string()));
        }
        Ok(CalendarDir {
            path: path.to_path_buf(),
            calendar_id: calendar_id.to_string(),
        })
    }

    /// All parseable events in the directory, in filename order.
    pub fn raw_events(&self) -> CalMirrorResult<Vec<CalendarEvent>> {
        Ok(self
            .event_files()?
            .into_iter()
            .filter_map(|path| {
                std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|content| parse_event(&content))
            })
            .collect())
    }

    /// Source snapshot: occurrences with starts inside `[from, to)`.
    ///
    /// Recurring masters expand into instances; RECURRENCE-ID files
    /// override the instance in their slot. Events without a start are
    /// passed through, the engine treats them as degenerate single
    /// occurrences.
    pub fn source_occurrences(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CalMirrorResult<Vec<Occurrence>> {
        let events = self.raw_events()?;

        // Instance overrides, grouped under their master's uid
        let mut overrides: HashMap<String, HashMap<String, CalendarEvent>> = HashMap::new();
        for event in &events {
            if let Some(recurrence_id) = event.recurrence_id {
                overrides
                    .entry(event.uid.clone())
                    .or_default()
                    .insert(format_instant(recurrence_id), event.clone());
            }
        }

        let master_uids: Vec<&str> = events
            .iter()
            .filter(|e| e.recurrence.is_some())
            .map(|e| e.uid.as_str())
            .collect();

        let mut occurrences = Vec::new();
        for event in &events {
            if let Some(recurrence_id) = event.recurrence_id {
                // Orphan override: no master file, sync it as a one-off
                // while keeping its original-slot identity
                if !master_uids.contains(&event.uid.as_str()) {
                    let occ = Occurrence::from_single(event);
                    if in_horizon(occ.start.or(Some(recurrence_id)), from, to) {
                        occurrences.push(occ);
                    }
                }
            } else if event.recurrence.is_some() {
                let empty = HashMap::new();
                let slot_overrides = overrides.get(&event.uid).unwrap_or(&empty);
                occurrences.extend(expand_recurring_event(event, from, to, slot_overrides)?);
            } else {
                let occ = Occurrence::from_single(event);
                if in_horizon(occ.start, from, to) {
                    occurrences.push(occ);
                }
            }
        }

        // Deterministic snapshot order
        occurrences.sort_by(|a, b| {
            (a.start, &a.source_event_id, a.occurrence_instant)
                .cmp(&(b.start, &b.source_event_id, b.occurrence_instant))
        });
        Ok(occurrences)
    }

    /// Target snapshot: every event in this calendar, stamped with the
    /// calendar's identifier.
    pub fn target_events(&self) -> CalMirrorResult<Vec<TargetEvent>> {
        Ok(self
            .raw_events()?
            .into_iter()
            .map(|event| TargetEvent {
                id: event.uid,
                calendar_id: self.calendar_id.clone(),
                title: event.title,
                start: event.start,
                end: event.end,
                location: event.location,
                notes: event.notes,
                url: event.url,
                all_day: event.all_day,
                availability: event.availability,
                last_updated: event.last_updated,
            })
            .collect())
    }

    // =========================================================================
    // Event operations
    // =========================================================================

    /// Create an event from a draft; returns the assigned identifier.
    pub fn create_event(&self, draft: &EventDraft, now: DateTime<Utc>) -> CalMirrorResult<String> {
        let uid = format!("{}@calmirror", uuid::Uuid::new_v4());
        let event = event_from_draft(&uid, draft, now);

        let content = generate_ics(&event)?;
        let filename = filename_for(&event, &self.path)?;
        std::fs::write(self.path.join(filename), content)?;
        Ok(uid)
    }

    /// Rewrite the event file carrying `event_id` with new content.
    pub fn update_event(
        &self,
        event_id: &str,
        draft: &EventDraft,
        now: DateTime<Utc>,
    ) -> CalMirrorResult<()> {
        let path = self.find_file(event_id)?.ok_or_else(|| {
            CalMirrorError::Sync(format!("No event file with id '{event_id}' to update"))
        })?;

        let event = event_from_draft(event_id, draft, now);
        std::fs::write(path, generate_ics(&event)?)?;
        Ok(())
    }

    /// Delete the event file carrying `event_id`. Already-gone is fine.
    pub fn delete_event(&self, event_id: &str) -> CalMirrorResult<()> {
        if let Some(path) = self.find_file(event_id)? {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn event_files(&self) -> CalMirrorResult<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "ics"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn find_file(&self, uid: &str) -> CalMirrorResult<Option<PathBuf>> {
        for path in self.event_files()? {
            let found = std::fs::read_to_string(&path)
                .ok()
                .and_then(|content| parse_event(&content))
                .is_some_and(|e| e.uid == uid);
            if found {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

fn in_horizon(start: Option<DateTime<Utc>>, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    match start {
        Some(s) => s >= from && s < to,
        None => true,
    }
}

fn event_from_draft(uid: &str, draft: &EventDraft, now: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        uid: uid.to_string(),
        title: draft.title.clone(),
        start: draft.start,
        end: draft.end,
        all_day: draft.all_day,
        location: draft.location.clone(),
        notes: draft.notes.clone(),
        url: draft.url.clone(),
        organizer: None,
        attendees: vec![],
        availability: draft.availability,
        recurrence: None,
        recurrence_id: None,
        last_updated: Some(now),
    }
}

// =============================================================================
// Filename generation
// =============================================================================

/// Generate a unique filename for an event, handling collisions.
fn filename_for(event: &CalendarEvent, dir: &Path) -> CalMirrorResult<String> {
    let base = base_filename(event);
    let stem = base.trim_end_matches(".ics");

    if !dir.join(&base).exists() || file_has_uid(dir, &base, &event.uid) {
        return Ok(base);
    }

    for n in 2..=100 {
        let suffixed = format!("{stem}-{n}.ics");
        if !dir.join(&suffixed).exists() || file_has_uid(dir, &suffixed, &event.uid) {
            return Ok(suffixed);
        }
    }

    Err(CalMirrorError::Sync(format!(
        "Too many filename collisions for {base}"
    )))
}

fn file_has_uid(dir: &Path, filename: &str, uid: &str) -> bool {
    std::fs::read_to_string(dir.join(filename))
        .ok()
        .and_then(|content| parse_event(&content))
        .is_some_and(|e| e.uid == uid)
}

fn base_filename(event: &CalendarEvent) -> String {
    let slug = slugify(&event.title);
    let date = match event.start {
        Some(start) if event.all_day => start.format("%Y-%m-%d").to_string(),
        Some(start) => start.format("%Y-%m-%dT%H%M").to_string(),
        None => "undated".to_string(),
    };
    format!("{date}__{slug}.ics")
}

fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(50)
        .collect()
}
