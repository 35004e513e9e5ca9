//! Read-only suggestions for the user to accept or dismiss.
//!
//! Unlike [`compute_adjustment`](super::compute_adjustment) the conditions
//! here are evaluated independently and several may fire together.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PlanChanges;
use crate::checkin::CheckinEvent;
use crate::drift::{DriftMetrics, RecentWindow, Trend};
use crate::error::ValidationError;
use crate::plan::{PlanParameters, FREQUENCY_FLOOR, MIN_MINUTES_FLOOR};

pub const MAX_SUGGESTIONS: usize = 3;

const HIGH_FRICTION: f64 = 2.5;
const LOW_COMPLETION: f64 = 0.5;
const LOW_COMPLETION_MIN_SAMPLES: usize = 3;
const BELOW_TARGET_RATE: f64 = 0.6;
const RECOVERY_DRIFT: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    ReduceDuration,
    SimplifyMinimumAction,
    ReduceFrequency,
    RecoveryMode,
}

impl SuggestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionKind::ReduceDuration => "reduce_duration",
            SuggestionKind::SimplifyMinimumAction => "simplify_minimum_action",
            SuggestionKind::ReduceFrequency => "reduce_frequency",
            SuggestionKind::RecoveryMode => "recovery_mode",
        }
    }
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SuggestionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reduce_duration" => Ok(SuggestionKind::ReduceDuration),
            "simplify_minimum_action" => Ok(SuggestionKind::SimplifyMinimumAction),
            "reduce_frequency" => Ok(SuggestionKind::ReduceFrequency),
            "recovery_mode" => Ok(SuggestionKind::RecoveryMode),
            other => Err(ValidationError::InvalidValue {
                field: "suggestion_kind".to_string(),
                message: format!("unknown suggestion kind '{other}'"),
            }),
        }
    }
}

/// A candidate adjustment awaiting user approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub message: String,
    pub changes: PlanChanges,
    pub reason: String,
}

/// Candidate adjustments in evaluation order, at most [`MAX_SUGGESTIONS`].
///
/// Only the newest five entries of `recent_checkins` are considered.
pub fn generate_suggestions(
    recent_checkins: &[CheckinEvent],
    current_plan: &PlanParameters,
    drift_score: f64,
    frequency_stats: &DriftMetrics,
) -> Vec<Suggestion> {
    let recent = RecentWindow::from_checkins(recent_checkins);
    let avg_friction = recent.avg_friction();
    let mut out = Vec::new();

    if avg_friction >= HIGH_FRICTION && current_plan.min_minutes > MIN_MINUTES_FLOOR {
        let new_minutes = current_plan.min_minutes.saturating_sub(5).max(MIN_MINUTES_FLOOR);
        if new_minutes != current_plan.min_minutes {
            out.push(Suggestion {
                kind: SuggestionKind::ReduceDuration,
                message: format!("Try {new_minutes}-minute sessions"),
                changes: PlanChanges {
                    min_minutes: Some(new_minutes),
                    ..Default::default()
                },
                reason: format!(
                    "Recent check-ins average friction {avg_friction:.1} of 3. Shorter sessions \
                     lower the cost of starting."
                ),
            });
        }
    }

    if recent.len() >= LOW_COMPLETION_MIN_SAMPLES && recent.completion_rate() < LOW_COMPLETION {
        out.push(Suggestion {
            kind: SuggestionKind::SimplifyMinimumAction,
            message: "Make your minimum action smaller".to_string(),
            changes: PlanChanges::default(),
            reason: format!(
                "The minimum action happened in {} of the last {} check-ins. A smaller first \
                 step fits more days.",
                recent.minimum_action_count(),
                recent.len()
            ),
        });
    }

    if frequency_stats.this_week_rate < BELOW_TARGET_RATE
        && frequency_stats.trend == Trend::Declining
        && current_plan.frequency_per_week > FREQUENCY_FLOOR
    {
        let new_frequency = current_plan.frequency_per_week - 1;
        if new_frequency != current_plan.frequency_per_week {
            out.push(Suggestion {
                kind: SuggestionKind::ReduceFrequency,
                message: format!("Aim for {new_frequency} sessions per week"),
                changes: PlanChanges {
                    frequency_per_week: Some(new_frequency),
                    ..Default::default()
                },
                reason: format!(
                    "This week has {} of {} sessions so far and the pace is slower than last \
                     week.",
                    frequency_stats.this_week_count, frequency_stats.this_week_target
                ),
            });
        }
    }

    if drift_score > RECOVERY_DRIFT && avg_friction >= HIGH_FRICTION {
        let new_frequency = current_plan
            .frequency_per_week
            .saturating_sub(1)
            .max(FREQUENCY_FLOOR);
        let changes = PlanChanges {
            min_minutes: (current_plan.min_minutes != MIN_MINUTES_FLOOR)
                .then_some(MIN_MINUTES_FLOOR),
            frequency_per_week: (new_frequency != current_plan.frequency_per_week)
                .then_some(new_frequency),
            ..Default::default()
        };
        if changes.has_parameter_changes() {
            out.push(Suggestion {
                kind: SuggestionKind::RecoveryMode,
                message: "Switch to recovery mode for a week".to_string(),
                changes,
                reason: "A lighter plan for a few days helps rebuild momentum before stepping \
                         back up."
                    .to_string(),
            });
        }
    }

    out.truncate(MAX_SUGGESTIONS);
    out
}
