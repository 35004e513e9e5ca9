//! Suggestion commands: list what could change, then accept or dismiss.

use clap::Subcommand;
use driftmirror_core::SuggestionKind;
use serde_json::{json, Map, Value};

use super::{open_service, print_json, CliResult};

#[derive(Subcommand)]
pub enum SuggestAction {
    /// List current suggestions (read-only)
    List {
        /// Goal ID
        goal_id: i64,
    },
    /// Accept a suggestion, creating a new plan version
    Accept {
        /// Goal ID
        goal_id: i64,
        /// reduce_duration, simplify_minimum_action, reduce_frequency or recovery_mode
        kind: String,
        /// Change map as JSON, e.g. '{"min_minutes": 10}'. Defaults to the
        /// current suggestion of this kind.
        #[arg(long)]
        changes: Option<String>,
    },
    /// Dismiss a suggestion
    Dismiss {
        /// Goal ID
        goal_id: i64,
        /// Suggestion kind
        kind: String,
    },
}

pub fn run(action: SuggestAction) -> CliResult {
    let service = open_service()?;

    match action {
        SuggestAction::List { goal_id } => {
            print_json(&service.suggestions(goal_id)?)?;
        }
        SuggestAction::Accept {
            goal_id,
            kind,
            changes,
        } => {
            let kind: SuggestionKind = kind.parse()?;
            let changes: Map<String, Value> = match changes {
                Some(raw) => serde_json::from_str(&raw)?,
                None => {
                    let suggestion = service
                        .suggestions(goal_id)?
                        .into_iter()
                        .find(|s| s.kind == kind)
                        .ok_or_else(|| format!("no {kind} suggestion for goal {goal_id}"))?;
                    match serde_json::to_value(&suggestion.changes)? {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    }
                }
            };
            let plan = service.accept_suggestion(goal_id, &changes, kind)?;
            print_json(&json!({ "accepted": kind, "plan": plan }))?;
        }
        SuggestAction::Dismiss { goal_id, kind } => {
            let kind: SuggestionKind = kind.parse()?;
            let id = service.dismiss_suggestion(goal_id, kind)?;
            print_json(&json!({ "dismissed": kind, "id": id }))?;
        }
    }
    Ok(())
}
