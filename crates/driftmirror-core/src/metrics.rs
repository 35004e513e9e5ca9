//! Dashboard aggregate for one goal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkin::CheckinEvent;
use crate::drift::{
    compute_drift_at, explain_rules_at, rule_strings, should_trigger_report, weekly_stats_at,
    DriftMetrics,
};

/// Consecutive minimum actions before a bigger step is offered.
pub const MOMENTUM_STREAK: usize = 5;
/// Minimum action rate needed for the momentum offer.
pub const MOMENTUM_MIN_RATE: f64 = 0.8;
/// Average friction above which the offer is withheld.
pub const MOMENTUM_MAX_FRICTION: f64 = 2.0;

const BASE_FORCED_BELOW_RATE: f64 = 0.6;
const BASE_FORCED_AT_FRICTION: f64 = 3.0;

/// Which version of the minimum action the user should be doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinimumLevel {
    #[default]
    Base,
    Momentum,
}

/// Whether to offer a slightly bigger minimum action, and the offer text.
pub fn minimum_action_scaling(
    streak: usize,
    minimum_action_rate: f64,
    avg_friction: f64,
) -> (bool, Option<String>) {
    let ready = streak >= MOMENTUM_STREAK
        && minimum_action_rate >= MOMENTUM_MIN_RATE
        && avg_friction <= MOMENTUM_MAX_FRICTION;
    if !ready {
        return (false, None);
    }
    let text = format!(
        "The minimum action has happened {streak} times in a row and feels light. \
         A slightly bigger version is an option when you want it; the base version still counts."
    );
    (true, Some(text))
}

/// Low follow-through or maximum friction always pins the base level.
pub fn active_minimum_level(
    suggest_momentum: bool,
    minimum_action_rate: f64,
    avg_friction: f64,
) -> MinimumLevel {
    if minimum_action_rate < BASE_FORCED_BELOW_RATE || avg_friction >= BASE_FORCED_AT_FRICTION {
        MinimumLevel::Base
    } else if suggest_momentum {
        MinimumLevel::Momentum
    } else {
        MinimumLevel::Base
    }
}

/// Everything the status view shows, computed from one history snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalMetrics {
    pub total_checkins: usize,
    /// Share of all loaded check-ins where the minimum action happened
    pub minimum_action_rate: f64,
    /// Consecutive newest check-ins with the minimum action done
    pub minimum_action_streak: usize,
    /// Mean friction over all loaded check-ins
    pub avg_friction: f64,
    pub drift_score: f64,
    pub this_week: DriftMetrics,
    pub target_frequency: u32,
    pub drift_triggered: bool,
    pub rules_applied: Vec<String>,
    pub suggest_momentum_minimum: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentum_suggestion_text: Option<String>,
    pub active_minimum_level: MinimumLevel,
}

impl GoalMetrics {
    pub fn compute(checkins: &[CheckinEvent], target_frequency: u32) -> Self {
        Self::compute_at(checkins, target_frequency, Utc::now())
    }

    pub fn compute_at(checkins: &[CheckinEvent], target_frequency: u32, now: DateTime<Utc>) -> Self {
        let this_week = weekly_stats_at(checkins, target_frequency, now);
        let drift_score = compute_drift_at(checkins, target_frequency, now);
        let rules_applied = rule_strings(&explain_rules_at(drift_score, checkins, target_frequency, now));

        if checkins.is_empty() {
            return Self {
                total_checkins: 0,
                minimum_action_rate: 0.0,
                minimum_action_streak: 0,
                avg_friction: 0.0,
                drift_score,
                this_week,
                target_frequency,
                drift_triggered: false,
                rules_applied,
                suggest_momentum_minimum: false,
                momentum_suggestion_text: None,
                active_minimum_level: MinimumLevel::Base,
            };
        }

        let total = checkins.len();
        let done = checkins.iter().filter(|c| c.did_minimum_action).count();
        let friction_sum: u32 = checkins.iter().map(|c| c.friction.value() as u32).sum();

        let mut newest_first: Vec<&CheckinEvent> = checkins.iter().collect();
        newest_first.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let minimum_action_streak = newest_first
            .iter()
            .take_while(|c| c.did_minimum_action)
            .count();
        let minimum_action_rate = done as f64 / total as f64;
        let avg_friction = friction_sum as f64 / total as f64;
        let (suggest_momentum_minimum, momentum_suggestion_text) =
            minimum_action_scaling(minimum_action_streak, minimum_action_rate, avg_friction);

        Self {
            total_checkins: total,
            minimum_action_rate,
            minimum_action_streak,
            avg_friction,
            drift_score,
            this_week,
            target_frequency,
            drift_triggered: should_trigger_report(drift_score, total),
            rules_applied,
            suggest_momentum_minimum,
            momentum_suggestion_text,
            active_minimum_level: active_minimum_level(
                suggest_momentum_minimum,
                minimum_action_rate,
                avg_friction,
            ),
        }
    }
}
