use clap::Subcommand;
use driftmirror_core::{CheckinDraft, Database};

use super::{open_service, print_json, CliResult};

#[derive(Subcommand)]
pub enum CheckinAction {
    /// Record a check-in and run drift detection
    Add {
        /// Goal ID
        goal_id: i64,
        /// The minimum action happened
        #[arg(long)]
        done: bool,
        /// 1 (easy) to 3 (hard)
        #[arg(long, default_value_t = 2)]
        friction: u8,
        /// What got in the way
        #[arg(long)]
        blocker: Option<String>,
        /// Anything done beyond the minimum action
        #[arg(long)]
        extra: Option<String>,
    },
    /// List check-ins, newest first
    List {
        /// Goal ID
        goal_id: i64,
        /// Maximum number of check-ins
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub fn run(action: CheckinAction) -> CliResult {
    match action {
        CheckinAction::Add {
            goal_id,
            done,
            friction,
            blocker,
            extra,
        } => {
            let service = open_service()?;
            let draft = CheckinDraft {
                did_minimum_action: done,
                friction,
                blocker,
                extra_done: extra,
            };
            print_json(&service.submit_checkin(goal_id, draft)?)?;
        }
        CheckinAction::List { goal_id, limit } => {
            let db = Database::open()?;
            db.get_goal(goal_id)?;
            print_json(&db.checkins(goal_id, Some(limit))?)?;
        }
    }
    Ok(())
}
