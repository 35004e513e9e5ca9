//! Drift detection: weekly frequency, scoring, trigger gate and rule
//! explanations.
//!
//! Everything here is a pure function of a check-in snapshot and a target
//! frequency. Functions that depend on the current instant come in two
//! forms: one reading the clock and an `_at` variant taking `now`.

pub mod frequency;
pub mod rules;
pub mod score;
pub mod trigger;
pub mod window;

pub use frequency::{week_start, weekly_rate, weekly_stats, weekly_stats_at, DriftMetrics, Trend};
pub use rules::{explain_rules, explain_rules_at, rule_strings, RuleTag};
pub use score::{compute_drift, compute_drift_at, drift_breakdown_at, DriftBreakdown};
pub use trigger::should_trigger_report;
pub use window::{RecentWindow, RECENT_WINDOW};
