use clap::Subcommand;
use driftmirror_core::Database;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Current plan (highest version)
    Current {
        /// Goal ID
        goal_id: i64,
    },
    /// Every plan version, oldest first
    History {
        /// Goal ID
        goal_id: i64,
    },
}

pub fn run(action: PlanAction) -> CliResult {
    let db = Database::open()?;

    match action {
        PlanAction::Current { goal_id } => {
            print_json(&db.latest_plan(goal_id)?)?;
        }
        PlanAction::History { goal_id } => {
            db.get_goal(goal_id)?;
            print_json(&db.plan_history(goal_id)?.versions())?;
        }
    }
    Ok(())
}
