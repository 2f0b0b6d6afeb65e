//! Plan types: the pure output of reconciliation.
//!
//! A plan is an ordered list of actions plus the mapping-table changes
//! that follow from them. Applying a plan is a separate step; re-running
//! the planner after a partial apply simply re-derives whatever is left.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{EventDraft, Occurrence, TargetEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            ActionKind::Create => "+",
            ActionKind::Update => "~",
            ActionKind::Delete => "-",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Delete => write!(f, "delete"),
        }
    }
}

/// One planned provider operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Occurrence key this action belongs to
    pub key: String,
    /// Source occurrence (absent for deletes)
    pub occurrence: Option<Occurrence>,
    /// Target snapshot event (absent for creates)
    pub target: Option<TargetEvent>,
    /// Desired target content (absent for deletes)
    pub draft: Option<EventDraft>,
    /// Human-readable explanation for logs
    pub reason: String,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self
            .draft
            .as_ref()
            .map(|d| d.title.as_str())
            .or_else(|| self.target.as_ref().map(|t| t.title.as_str()))
            .unwrap_or("(unknown)");
        write!(f, "{} {} ({})", self.kind, title, self.key)
    }
}

/// A mapping-table change the apply step must persist alongside its action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MappingDelta {
    /// Row inserted once the create succeeds; the apply step fills in the
    /// identifier the provider assigns.
    InsertAfterCreate { key: String },
    /// Row refreshed when its twin is updated
    Touch { key: String, target_event_id: String },
    /// Row removed when its twin is deleted
    Remove { key: String },
}

/// The reconciliation output: ordered actions plus mapping deltas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
    /// Mapping rows whose target event no longer exists anywhere; removed
    /// without a provider call.
    pub orphaned_mapping_keys: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.orphaned_mapping_keys.is_empty()
    }

    /// (creates, updates, deletes) in this plan.
    pub fn counts(&self) -> (usize, usize, usize) {
        let count = |kind| self.actions.iter().filter(|a| a.kind == kind).count();
        (
            count(ActionKind::Create),
            count(ActionKind::Update),
            count(ActionKind::Delete),
        )
    }

    /// Mapping changes implied by the plan, in action order, with orphan
    /// removals appended.
    pub fn mapping_deltas(&self) -> Vec<MappingDelta> {
        let mut deltas: Vec<MappingDelta> = self
            .actions
            .iter()
            .map(|action| match action.kind {
                ActionKind::Create => MappingDelta::InsertAfterCreate {
                    key: action.key.clone(),
                },
                ActionKind::Update => MappingDelta::Touch {
                    key: action.key.clone(),
                    target_event_id: action
                        .target
                        .as_ref()
                        .map(|t| t.id.clone())
                        .unwrap_or_default(),
                },
                ActionKind::Delete => MappingDelta::Remove {
                    key: action.key.clone(),
                },
            })
            .collect();

        deltas.extend(
            self.orphaned_mapping_keys
                .iter()
                .map(|key| MappingDelta::Remove { key: key.clone() }),
        );
        deltas
    }
}

/// Outcome counts of one applied sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Actions whose provider call failed; re-planned on the next run
    pub failed: usize,
}

impl RunSummary {
    pub fn is_noop(&self) -> bool {
        *self == RunSummary::default()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted",
            self.created, self.updated, self.deleted
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}
