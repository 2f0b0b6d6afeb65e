//! Terminal rendering for plans and actions.

use calmirror_core::plan::{Action, ActionKind, Plan};
use owo_colors::OwoColorize;

/// Extension trait for colored terminal rendering.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for ActionKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            ActionKind::Create => symbol.green().to_string(),
            ActionKind::Update => symbol.yellow().to_string(),
            ActionKind::Delete => symbol.red().to_string(),
        }
    }
}

impl Render for Action {
    fn render(&self) -> String {
        let title = self
            .draft
            .as_ref()
            .map(|d| d.title.clone())
            .or_else(|| self.target.as_ref().map(|t| t.title.clone()))
            .unwrap_or_else(|| "(unknown)".to_string());

        let start = self
            .draft
            .as_ref()
            .and_then(|d| d.start)
            .or_else(|| self.target.as_ref().and_then(|t| t.start));
        let time = match start {
            Some(start) => start.format("%Y-%m-%d %H:%M").to_string(),
            None => "undated".to_string(),
        };

        format!(
            "{} {} {}",
            self.kind.render(),
            title,
            format!("{time} · {}", self.reason).dimmed()
        )
    }
}

/// Threshold for compact view (show counts instead of individual actions)
const COMPACT_THRESHOLD: usize = 8;

/// Render a whole plan, one action per line, collapsing to counts for
/// large plans unless verbose.
pub fn render_plan(plan: &Plan, verbose: bool) -> String {
    if plan.actions.is_empty() {
        return "   Nothing to do".dimmed().to_string();
    }

    if !verbose && plan.actions.len() > COMPACT_THRESHOLD {
        let (created, updated, deleted) = plan.counts();
        return format!(
            "   {} to create, {} to update, {} to delete (run with --verbose to list)",
            created.to_string().green(),
            updated.to_string().yellow(),
            deleted.to_string().red(),
        );
    }

    plan.actions
        .iter()
        .map(|action| format!("   {}", action.render()))
        .collect::<Vec<_>>()
        .join("\n")
}
