//! Core library for the calmirror ecosystem.
//!
//! The heart is the reconciliation engine in [`reconcile`]: a pure,
//! deterministic function from four snapshots (source occurrences, target
//! events, mapping rows, configuration) to a create/update/delete plan.
//! Everything that touches the outside world (calendar directories, the
//! mapping store, the scheduler) lives around it, never inside it.

pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod ics;
pub mod mapping;
pub mod marker;
pub mod matcher;
pub mod occurrence_key;
pub mod plan;
pub mod reconcile;
pub mod recurrence;
pub mod safety;
pub mod store;
pub mod time_window;

pub use config::{SyncConfig, SyncMode};
pub use error::{CalMirrorError, CalMirrorResult};
pub use event::{Attendee, Availability, CalendarEvent, EventDraft, Occurrence, TargetEvent};
pub use mapping::MappingRow;
pub use marker::Marker;
pub use occurrence_key::OccurrenceKey;
pub use plan::{Action, ActionKind, Plan, RunSummary};
pub use reconcile::{ReconcileInput, build_plan, build_purge_plan};
