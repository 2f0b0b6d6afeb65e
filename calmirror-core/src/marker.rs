//! Ownership markers embedded in target event free text.
//!
//! Every event calmirror creates carries a marker in its notes (and in the
//! URL field when that is otherwise unused). The marker is an advisory
//! identity hint: the mapping table stays the source of truth, but markers
//! survive identifier rotation and mapping loss, and they let one sync
//! recognize events owned by another.
//!
//! Wire format, written into externally visible event fields and therefore
//! kept backward-parseable: the literal prefix followed by space-separated
//! `key=value` tokens on one line. Values take everything after the first
//! `=` in a token. Any subset of fields may be present.

use serde::{Deserialize, Serialize};

use crate::occurrence_key::OccurrenceKey;

/// Literal prefix that makes marker text recognizable.
pub const MARKER_PREFIX: &str = "calmirror:v1";

/// A decoded ownership marker. All fields optional; a marker is
/// recognized if at least one known field parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Tag of the sync that owns the event
    pub owner: Option<String>,
    /// Source event identifier
    pub source_event_id: Option<String>,
    /// Occurrence instant in key form
    pub occurrence_iso: Option<String>,
    /// Full occurrence key string
    pub sync_key: Option<String>,
}

impl Marker {
    /// Build the marker for an occurrence owned by `owner_tag`.
    pub fn for_occurrence(owner_tag: &str, key: &OccurrenceKey) -> Self {
        Marker {
            owner: Some(owner_tag.to_string()),
            source_event_id: Some(key.source_id.clone()),
            occurrence_iso: Some(key.instant_iso.clone()),
            sync_key: Some(key.to_string()),
        }
    }

    /// Render as an embeddable text fragment.
    pub fn encode(&self) -> String {
        let mut out = String::from(MARKER_PREFIX);
        if let Some(ref owner) = self.owner {
            out.push_str(&format!(" owner={owner}"));
        }
        if let Some(ref src) = self.source_event_id {
            out.push_str(&format!(" src={src}"));
        }
        if let Some(ref occ) = self.occurrence_iso {
            out.push_str(&format!(" occ={occ}"));
        }
        if let Some(ref key) = self.sync_key {
            out.push_str(&format!(" key={key}"));
        }
        out
    }

    /// Scan notes and URL text for a marker.
    ///
    /// Tokenizes on the first prefix found. Malformed or truncated text is
    /// a normal outcome and yields `None`, never an error.
    pub fn decode(notes: Option<&str>, url: Option<&str>) -> Option<Marker> {
        notes
            .and_then(decode_text)
            .or_else(|| url.and_then(decode_text))
    }

    /// True when the marker names `tag` as its owner.
    pub fn owned_by(&self, tag: &str) -> bool {
        self.owner.as_deref() == Some(tag)
    }
}

/// Remove marker-bearing lines from free text.
///
/// Used when copying source notes into a target draft, so the twin ends
/// up decoding to exactly one marker: the one this sync appends.
pub fn strip_markers(text: &str) -> String {
    text.lines()
        .filter(|line| !line.contains(MARKER_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn decode_text(text: &str) -> Option<Marker> {
    let at = text.find(MARKER_PREFIX)?;
    let rest = &text[at + MARKER_PREFIX.len()..];
    // Marker tokens run to the end of the line it sits on
    let line = rest.lines().next().unwrap_or("");

    let mut marker = Marker::default();
    let mut recognized = false;

    for token in line.split_whitespace() {
        let Some((k, v)) = token.split_once('=') else {
            continue;
        };
        if v.is_empty() {
            continue;
        }
        match k {
            "owner" => marker.owner = Some(v.to_string()),
            "src" => marker.source_event_id = Some(v.to_string()),
            "occ" => marker.occurrence_iso = Some(v.to_string()),
            "key" => marker.sync_key = Some(v.to_string()),
            _ => continue,
        }
        recognized = true;
    }

    recognized.then_some(marker)
}
