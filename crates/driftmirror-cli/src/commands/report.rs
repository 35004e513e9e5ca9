use clap::builder::BoolishValueParser;
use clap::Subcommand;
use driftmirror_core::Database;

use super::{open_service, print_json, CliResult};

#[derive(Subcommand)]
pub enum ReportAction {
    /// Latest mirror report for a goal (null if none yet)
    Latest {
        /// Goal ID
        goal_id: i64,
    },
    /// Progress summary over the whole history of a goal
    Summary {
        /// Goal ID
        goal_id: i64,
    },
    /// Rate a report as helpful or not
    Feedback {
        /// Report ID
        report_id: i64,
        /// yes/no, true/false
        #[arg(action = clap::ArgAction::Set, value_parser = BoolishValueParser::new())]
        helpful: bool,
    },
}

pub fn run(action: ReportAction) -> CliResult {
    match action {
        ReportAction::Latest { goal_id } => {
            let db = Database::open()?;
            db.get_goal(goal_id)?;
            print_json(&db.latest_report(goal_id)?)?;
        }
        ReportAction::Summary { goal_id } => {
            let service = open_service()?;
            print_json(&service.progress_summary(goal_id)?)?;
        }
        ReportAction::Feedback { report_id, helpful } => {
            let service = open_service()?;
            print_json(&service.record_feedback(report_id, helpful)?)?;
        }
    }
    Ok(())
}
