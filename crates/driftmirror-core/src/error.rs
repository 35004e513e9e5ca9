//! Core error types for driftmirror-core.
//!
//! The scoring and policy functions never fail: degenerate input maps to a
//! defined answer. These errors belong to the layers around them (storage,
//! configuration, input validation and text generation).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by storage, configuration and the service.
#[derive(Error, Debug)]
pub enum CoreError {
    /// SQLite storage failed
    #[error("storage: {0}")]
    Database(#[from] DatabaseError),

    /// config.toml could not be read, written or updated
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// User input rejected before anything was written
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Text generation errors that were not absorbed by a fallback
    #[error("generator: {0}")]
    Generator(#[from] GeneratorError),

    /// A referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Stored JSON columns or payloads
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// Storage errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("cannot open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("schema migration failed: {0}")]
    MigrationFailed(String),

    /// A plan version was appended out of sequence
    #[error("plan version conflict for goal {goal_id}: expected {expected}, got {actual}")]
    VersionConflict {
        goal_id: i64,
        expected: u32,
        actual: u32,
    },

    /// Another writer held the lock past the busy timeout
    #[error("database is locked")]
    Locked,
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot parse {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("cannot write {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown key: {0}")]
    UnknownKey(String),

    #[error("bad value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("data directory unavailable: {0}")]
    DataDir(String),
}

/// Input validation errors. Comparable so tests can match exact values.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Value outside its permitted range
    #[error("'{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Text longer than permitted
    #[error("'{field}' must be at most {max} characters, got {len}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Key not recognized in an untyped payload
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("'{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Text generation errors.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The generator has no credentials or is disabled
    #[error("'{0}' is not configured")]
    NotConfigured(String),

    /// Transport or HTTP failure
    #[error("request failed: {0}")]
    Request(String),

    /// The model answered with no text
    #[error("empty response")]
    EmptyResponse,

    /// The model's text did not contain the expected JSON shape
    #[error("unparseable response: {0}")]
    Unparseable(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        GeneratorError::Request(err.to_string())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
