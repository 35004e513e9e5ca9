use super::{open_service, print_json, CliResult};

pub fn run(goal_id: i64) -> CliResult {
    let service = open_service()?;
    print_json(&service.dashboard(goal_id)?)
}
