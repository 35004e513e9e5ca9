//! Mirror reports: qualitative findings layered on top of the numeric
//! drift pipeline.
//!
//! Nothing in `drift` or `adjust` depends on this module. Composition is a
//! chain of [`MirrorGenerator`] strategies that always ends with the
//! deterministic composer, so a report is produced even when every text
//! generator fails. Progress summaries go through the same chain.

pub mod gemini;
pub mod generator;
pub mod json;
pub mod report;
pub mod signals;
pub mod summary;

use serde::Serialize;

use crate::checkin::CheckinEvent;
use crate::plan::PlanParameters;

pub use gemini::GeminiClient;
pub use generator::{
    build_prompt, truncate_prompt, DeterministicGenerator, GeneratorChain, LlmBackedGenerator,
    MirrorGenerator, TextGenerator, MIRROR_SYSTEM, TRUNCATION_MARKER,
};
pub use json::extract_json_object;
pub use report::{compose_deterministic, Finding, MirrorReport, ReportSource, MAX_FINDINGS};
pub use signals::{extract_signals, Signal, SignalKind, MAX_SIGNALS_PER_CHECKIN};
pub use summary::{
    compose_summary_deterministic, days_to_habit, ProgressNote, ProgressSummary, SummaryContext,
    HABIT_DAYS,
};

/// Everything a composer may look at.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorContext {
    pub goal_title: String,
    pub goal_why: Option<String>,
    pub plan: PlanParameters,
    /// Signals of recent check-ins, newest first
    pub signals: Vec<Signal>,
    pub drift_score: f64,
    pub rules_applied: Vec<String>,
    /// Loaded check-in history, newest first
    pub checkins: Vec<CheckinEvent>,
}
