//! Priority-ordered plan adjustment.
//!
//! At most one category of change is proposed per evaluation. The order is
//! fixed: minimum action, duration, time window, frequency. The first branch
//! that fires wins and lower branches are never evaluated, which keeps a plan
//! from being squeezed on several axes at once.

use serde::{Deserialize, Serialize};

use super::{AdjustmentDecision, PlanChanges};
use crate::checkin::CheckinEvent;
use crate::drift::RecentWindow;
use crate::plan::{PlanParameters, TimeWindow, FREQUENCY_FLOOR, MIN_MINUTES_FLOOR};

/// Rationale when nothing changes.
pub const KEEP_GOING: &str = "Keep going—small steps compound over time.";

/// Drift at or below which the plan is left alone.
pub const ADJUSTMENT_MIN_DRIFT: f64 = 0.3;
/// Recent check-ins needed before any change is considered.
pub const ADJUSTMENT_MIN_CHECKINS: usize = 3;

const MINIMUM_ACTION_RATE_THRESHOLD: f64 = 0.6;
const HIGH_FRICTION_THRESHOLD: f64 = 2.5;
const MISSES_FOR_WINDOW_SHIFT: usize = 2;
const COMPLETION_RATE_THRESHOLD: f64 = 0.5;
const DURATION_STEP: u32 = 5;

/// The aggregate inputs of [`compute_adjustment`], gathered in one place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentSignals {
    pub drift_score: f64,
    /// Mean friction over the recent window
    pub avg_friction: f64,
    /// Minimum-action rate over the recent window
    pub completion_rate: f64,
    /// Minimum-action rate over the loaded history
    pub minimum_action_rate: f64,
}

impl AdjustmentSignals {
    pub fn from_history(drift_score: f64, history: &[CheckinEvent]) -> Self {
        let recent = RecentWindow::from_checkins(history);
        let minimum_action_rate = if history.is_empty() {
            0.0
        } else {
            history.iter().filter(|c| c.did_minimum_action).count() as f64 / history.len() as f64
        };
        Self {
            drift_score,
            avg_friction: recent.avg_friction(),
            completion_rate: recent.completion_rate(),
            minimum_action_rate,
        }
    }
}

/// Decide the single most important change to the current plan, if any.
pub fn compute_adjustment(
    current_plan: &PlanParameters,
    drift_score: f64,
    avg_friction: f64,
    completion_rate: f64,
    minimum_action_rate: f64,
    recent_checkins: &[CheckinEvent],
) -> AdjustmentDecision {
    if drift_score <= ADJUSTMENT_MIN_DRIFT || recent_checkins.len() < ADJUSTMENT_MIN_CHECKINS {
        return AdjustmentDecision::keep_going();
    }

    // 1. Minimum action: behavior before schedule.
    if minimum_action_rate < MINIMUM_ACTION_RATE_THRESHOLD {
        return AdjustmentDecision {
            changes: PlanChanges {
                simplify_minimum_action: true,
                ..Default::default()
            },
            rationale: "Let's make the first step even easier. Pick a minimum action so small \
                        it fits into your hardest day, then build from there."
                .to_string(),
        };
    }

    // 2. Duration.
    if avg_friction >= HIGH_FRICTION_THRESHOLD {
        let new_minutes = current_plan
            .min_minutes
            .saturating_sub(DURATION_STEP)
            .max(MIN_MINUTES_FLOOR);
        if new_minutes != current_plan.min_minutes {
            return AdjustmentDecision {
                changes: PlanChanges {
                    min_minutes: Some(new_minutes),
                    ..Default::default()
                },
                rationale: format!(
                    "Sessions of {new_minutes} minutes match your current energy. \
                     Consistency matters more than length right now."
                ),
            };
        }
    }

    // 3. Time window.
    let misses = recent_checkins.iter().filter(|c| !c.did_minimum_action).count();
    if misses >= MISSES_FOR_WINDOW_SHIFT {
        let next = TimeWindow::rotate_from(current_plan.time_window);
        return AdjustmentDecision {
            changes: PlanChanges {
                time_window: Some(next),
                ..Default::default()
            },
            rationale: format!(
                "Trying the {next} might line up better with when you have energy to spare."
            ),
        };
    }

    // 4. Frequency, last resort.
    if completion_rate < COMPLETION_RATE_THRESHOLD {
        let new_frequency = current_plan
            .frequency_per_week
            .saturating_sub(1)
            .max(FREQUENCY_FLOOR);
        if new_frequency != current_plan.frequency_per_week {
            return AdjustmentDecision {
                changes: PlanChanges {
                    frequency_per_week: Some(new_frequency),
                    ..Default::default()
                },
                rationale: format!(
                    "Aligning the plan to {new_frequency} sessions a week builds a rhythm \
                     you can count on."
                ),
            };
        }
    }

    AdjustmentDecision::keep_going()
}

/// Turn a decision into the next plan version.
///
/// Returns `None` when the decision names no plan field (empty, or only the
/// `simplify_minimum_action` flag).
pub fn apply_decision(
    current_plan: &PlanParameters,
    decision: &AdjustmentDecision,
) -> Option<PlanParameters> {
    if !decision.changes.has_parameter_changes() {
        return None;
    }
    Some(current_plan.next_version(&decision.changes, decision.rationale.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::FORBIDDEN_RATIONALE_WORDS;
    use crate::checkin::Friction;
    use chrono::{Duration, Utc};

    fn plan(frequency: u32, minutes: u32, window: Option<TimeWindow>) -> PlanParameters {
        PlanParameters::initial(frequency, minutes, window, None).unwrap()
    }

    fn recent(done: &[bool]) -> Vec<CheckinEvent> {
        done.iter()
            .enumerate()
            .map(|(i, d)| {
                CheckinEvent::new(Utc::now() - Duration::hours(i as i64), *d, Friction::MEDIUM)
            })
            .collect()
    }

    #[test]
    fn low_drift_keeps_plan() {
        let decision = compute_adjustment(
            &plan(3, 20, None),
            0.3,
            3.0,
            0.0,
            0.0,
            &recent(&[false, false, false]),
        );
        assert!(decision.changes.is_empty());
        assert_eq!(decision.rationale, KEEP_GOING);
    }

    #[test]
    fn short_history_keeps_plan() {
        let decision =
            compute_adjustment(&plan(3, 20, None), 0.9, 3.0, 0.0, 0.0, &recent(&[false, false]));
        assert!(decision.changes.is_empty());
    }

    #[test]
    fn minimum_action_preempts_duration() {
        let decision = compute_adjustment(
            &plan(3, 20, None),
            0.8,
            3.0,
            0.2,
            0.2,
            &recent(&[false, false, false]),
        );
        assert!(decision.changes.simplify_minimum_action);
        assert_eq!(decision.changes.min_minutes, None);
        assert!(!decision.changes.has_parameter_changes());
    }

    #[test]
    fn duration_steps_down_by_five() {
        let decision = compute_adjustment(
            &plan(3, 20, None),
            0.5,
            2.5,
            0.8,
            0.8,
            &recent(&[true, true, true]),
        );
        assert_eq!(decision.changes.min_minutes, Some(15));
        assert_eq!(decision.changes.time_window, None);
    }

    #[test]
    fn duration_at_floor_falls_through() {
        // Friction is high but 5 minutes cannot go lower; with two misses the
        // time window branch fires instead.
        let decision = compute_adjustment(
            &plan(3, 5, Some(TimeWindow::Evening)),
            0.5,
            3.0,
            0.6,
            0.7,
            &recent(&[true, false, false, true, true]),
        );
        assert_eq!(decision.changes.min_minutes, None);
        assert_eq!(decision.changes.time_window, Some(TimeWindow::Night));
    }

    #[test]
    fn duration_at_floor_with_no_other_branch_keeps_going() {
        let decision = compute_adjustment(
            &plan(3, 5, None),
            0.5,
            3.0,
            0.8,
            0.8,
            &recent(&[true, true, true]),
        );
        assert!(decision.changes.is_empty());
        assert_eq!(decision.rationale, KEEP_GOING);
    }

    #[test]
    fn time_window_wraps_from_night() {
        let decision = compute_adjustment(
            &plan(3, 20, Some(TimeWindow::Night)),
            0.5,
            1.5,
            0.6,
            0.7,
            &recent(&[false, true, false]),
        );
        assert_eq!(decision.changes.time_window, Some(TimeWindow::Morning));
    }

    #[test]
    fn frequency_is_last_resort() {
        // One miss in the window, but recent completion still below half
        // because the caller measured it over a different slice.
        let decision = compute_adjustment(
            &plan(4, 20, None),
            0.5,
            1.5,
            0.4,
            0.7,
            &recent(&[true, true, false]),
        );
        assert_eq!(decision.changes.frequency_per_week, Some(3));
    }

    #[test]
    fn frequency_at_floor_is_not_proposed() {
        let decision = compute_adjustment(
            &plan(1, 20, None),
            0.5,
            1.5,
            0.4,
            0.7,
            &recent(&[true, true, false]),
        );
        assert!(decision.changes.is_empty());
    }

    #[test]
    fn rationales_avoid_failure_language() {
        let cases = [
            compute_adjustment(&plan(3, 20, None), 0.8, 3.0, 0.2, 0.2, &recent(&[false; 3])),
            compute_adjustment(&plan(3, 20, None), 0.5, 2.5, 0.8, 0.8, &recent(&[true; 3])),
            compute_adjustment(
                &plan(3, 20, None),
                0.5,
                1.5,
                0.6,
                0.7,
                &recent(&[false, true, false]),
            ),
            compute_adjustment(
                &plan(4, 20, None),
                0.5,
                1.5,
                0.4,
                0.7,
                &recent(&[true, true, false]),
            ),
        ];
        for decision in cases {
            assert!(!decision.changes.is_empty());
            let lower = decision.rationale.to_lowercase();
            for word in FORBIDDEN_RATIONALE_WORDS {
                assert!(!lower.contains(word), "{word:?} in {:?}", decision.rationale);
            }
        }
    }

    #[test]
    fn apply_decision_inherits_fields() {
        let current = plan(4, 20, Some(TimeWindow::Morning));
        let decision = AdjustmentDecision {
            changes: PlanChanges {
                time_window: Some(TimeWindow::Afternoon),
                ..Default::default()
            },
            rationale: "shift".into(),
        };
        let next = apply_decision(&current, &decision).unwrap();
        assert_eq!(next.version, current.version + 1);
        assert_eq!(next.frequency_per_week, 4);
        assert_eq!(next.min_minutes, 20);
        assert_eq!(next.time_window, Some(TimeWindow::Afternoon));
    }

    #[test]
    fn apply_decision_skips_flag_only() {
        let decision = AdjustmentDecision {
            changes: PlanChanges {
                simplify_minimum_action: true,
                ..Default::default()
            },
            rationale: "easier".into(),
        };
        assert!(apply_decision(&plan(3, 20, None), &decision).is_none());
    }

    #[test]
    fn signals_measure_window_and_history_separately() {
        let mut history = recent(&[true, false, false, false, true]);
        // older successes outside the window
        history.extend((10..15).map(|h| {
            CheckinEvent::new(Utc::now() - Duration::hours(h), true, Friction::LOW)
        }));
        let signals = AdjustmentSignals::from_history(0.5, &history);
        assert!((signals.completion_rate - 0.4).abs() < 1e-9);
        assert!((signals.minimum_action_rate - 0.7).abs() < 1e-9);
        assert!((signals.avg_friction - 2.0).abs() < 1e-9);
    }
}
