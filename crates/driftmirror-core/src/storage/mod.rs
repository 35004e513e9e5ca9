mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, DefaultsConfig, LlmConfig, RateLimitConfig};
pub use database::{
    Database, FeedbackSummary, InsightAction, InsightActionKind, StoredCheckin, StoredReport,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `DRIFTMIRROR_DATA_DIR` overrides the location outright. Otherwise the
/// directory is `~/.config/driftmirror[-dev]/`, with the `-dev` suffix when
/// `DRIFTMIRROR_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("DRIFTMIRROR_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("DRIFTMIRROR_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("driftmirror-dev")
            } else {
                base_dir.join("driftmirror")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
