//! Goal management commands for CLI.

use clap::Subcommand;
use driftmirror_core::{Config, Database, GoalMode, NewGoal, TimeWindow};
use serde_json::json;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum GoalAction {
    /// Create a goal and its first plan version
    Create {
        /// Goal title
        title: String,
        /// Why this goal matters
        #[arg(long)]
        why: Option<String>,
        /// personal_growth or productivity
        #[arg(long, default_value = "personal_growth")]
        mode: String,
        /// Sessions per week (default from config)
        #[arg(long)]
        frequency: Option<u32>,
        /// Minutes per session (default from config)
        #[arg(long)]
        minutes: Option<u32>,
        /// morning, afternoon, evening or night (default from config)
        #[arg(long)]
        window: Option<String>,
        /// The smallest step that still counts
        #[arg(long)]
        minimum_action: Option<String>,
    },
    /// List goals
    List,
    /// Show a goal with its current plan
    Show {
        /// Goal ID
        id: i64,
    },
}

pub fn run(action: GoalAction) -> CliResult {
    let db = Database::open()?;

    match action {
        GoalAction::Create {
            title,
            why,
            mode,
            frequency,
            minutes,
            window,
            minimum_action,
        } => {
            let defaults = Config::load()?.defaults;
            let time_window = match window {
                Some(raw) => raw.parse::<TimeWindow>()?,
                None => defaults.time_window,
            };

            let mut new_goal = NewGoal::new(
                title,
                frequency.unwrap_or(defaults.frequency_per_week),
                minutes.unwrap_or(defaults.min_minutes),
            );
            new_goal.why = why;
            new_goal.mode = mode.parse::<GoalMode>()?;
            new_goal.time_window = Some(time_window);
            new_goal.minimum_action_text = minimum_action;

            let (goal, plan) = db.create_goal(&new_goal)?;
            print_json(&json!({ "goal": goal, "plan": plan }))?;
        }
        GoalAction::List => {
            print_json(&db.list_goals()?)?;
        }
        GoalAction::Show { id } => {
            let goal = db.get_goal(id)?;
            let plan = db.latest_plan(id)?;
            print_json(&json!({ "goal": goal, "plan": plan }))?;
        }
    }
    Ok(())
}
