//! Plan adjustment: the direct-apply policy, the read-only suggestion
//! generator and validation of externally supplied changes.

mod policy;
mod suggestions;
mod validate;

use serde::{Deserialize, Serialize};

use crate::plan::TimeWindow;

pub use policy::{
    apply_decision, compute_adjustment, AdjustmentSignals, ADJUSTMENT_MIN_CHECKINS,
    ADJUSTMENT_MIN_DRIFT, KEEP_GOING,
};
pub use suggestions::{generate_suggestions, Suggestion, SuggestionKind, MAX_SUGGESTIONS};
pub use validate::{validate_changes, FORBIDDEN_RATIONALE_WORDS};

/// Sparse set of plan changes. Serializes as a map holding only the keys
/// that are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_per_week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    /// The user should define an easier minimum action. Not a plan field.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simplify_minimum_action: bool,
}

impl PlanChanges {
    pub fn is_empty(&self) -> bool {
        !self.has_parameter_changes() && !self.simplify_minimum_action
    }

    /// True when a real plan field is named, as opposed to only the flag.
    pub fn has_parameter_changes(&self) -> bool {
        self.frequency_per_week.is_some() || self.min_minutes.is_some() || self.time_window.is_some()
    }
}

/// Output of the adjustment policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentDecision {
    pub changes: PlanChanges,
    pub rationale: String,
}

impl AdjustmentDecision {
    pub fn keep_going() -> Self {
        Self {
            changes: PlanChanges::default(),
            rationale: KEEP_GOING.to_string(),
        }
    }
}
