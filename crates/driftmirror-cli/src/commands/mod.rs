pub mod checkin;
pub mod config;
pub mod goal;
pub mod plan;
pub mod report;
pub mod status;
pub mod suggest;

use driftmirror_core::{Config, Database, DriftService};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Service over the database in the data directory, configured from
/// `config.toml`.
pub fn open_service() -> Result<DriftService, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let path = Database::default_path()?;
    tracing::debug!(path = %path.display(), llm = config.llm.enabled, "opening drift service");
    Ok(DriftService::from_config(&path, &config)?)
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
