//! # DriftMirror Core Library
//!
//! Drift detection and adaptive plan adjustment for habit tracking. A goal
//! carries a versioned plan (sessions per week, minutes per session, a time
//! window). Each check-in records whether the minimum action happened and
//! how hard it felt; from that history the library scores how far the user
//! has drifted from the plan and, past a threshold, proposes a gentler plan.
//!
//! ## Architecture
//!
//! - **Drift**: pure functions over a newest-first check-in snapshot
//!   (weekly frequency, weighted drift score, trigger gate, rule tags)
//! - **Adjust**: the priority-ordered adjustment policy, read-only
//!   suggestions and validation of externally supplied changes
//! - **Mirror**: qualitative reports composed by a fallback chain of
//!   generators ending in a deterministic composer
//! - **Storage**: SQLite persistence with an append-only plan log and
//!   TOML configuration
//! - **Service**: ties the above together per check-in
//!
//! ## Key Components
//!
//! - [`compute_drift`]: weighted drift score in [0, 1]
//! - [`compute_adjustment`]: at most one plan change per evaluation
//! - [`DriftService`]: check-in submission, dashboard, suggestions and
//!   progress summaries
//! - [`Database`]: goal, check-in and plan persistence
//! - [`Config`]: application configuration management

pub mod adjust;
pub mod checkin;
pub mod drift;
pub mod error;
pub mod goal;
pub mod metrics;
pub mod mirror;
pub mod plan;
pub mod rate_limit;
pub mod service;
pub mod storage;

pub use adjust::{
    apply_decision, compute_adjustment, generate_suggestions, validate_changes,
    AdjustmentDecision, PlanChanges, Suggestion, SuggestionKind,
};
pub use checkin::{CheckinDraft, CheckinEvent, Friction};
pub use drift::{
    compute_drift, explain_rules, should_trigger_report, weekly_stats, DriftMetrics, RuleTag,
    Trend,
};
pub use error::{ConfigError, CoreError, DatabaseError, GeneratorError, Result, ValidationError};
pub use goal::{Goal, GoalMode, NewGoal};
pub use metrics::{GoalMetrics, MinimumLevel};
pub use mirror::{GeneratorChain, MirrorReport, ProgressSummary, Signal};
pub use plan::{PlanHistory, PlanParameters, TimeWindow};
pub use rate_limit::{InMemoryRateLimiter, RateDecision, RateLimiter, SqliteRateLimiter};
pub use service::{CheckinOutcome, Dashboard, DriftService};
pub use storage::{Config, Database};
