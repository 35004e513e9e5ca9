//! Drift scoring.
//!
//! Four factors, each normalized to [0, 1], weighted and summed:
//!
//! | factor     | definition                         | weight |
//! |------------|------------------------------------|--------|
//! | frequency  | `1 - this_week_rate`               | 0.40   |
//! | completion | `1 - done / len(recent)`           | 0.25   |
//! | friction   | `(avg_friction - 1) / 2`           | 0.20   |
//! | blockers   | `with_blocker / len(recent)`       | 0.15   |
//!
//! An empty history scores 0.0: a brand-new goal has no drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::frequency::weekly_stats_at;
use super::window::RecentWindow;
use crate::checkin::CheckinEvent;

pub const FREQUENCY_WEIGHT: f64 = 0.40;
pub const COMPLETION_WEIGHT: f64 = 0.25;
pub const FRICTION_WEIGHT: f64 = 0.20;
pub const BLOCKER_WEIGHT: f64 = 0.15;

/// Per-factor contributions behind a drift score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftBreakdown {
    pub frequency_drift: f64,
    pub completion_drift: f64,
    pub friction_drift: f64,
    pub blocker_rate: f64,
    /// Weighted sum, clamped to [0, 1]
    pub score: f64,
}

/// Drift score as of now.
pub fn compute_drift(checkins: &[CheckinEvent], target_frequency: u32) -> f64 {
    compute_drift_at(checkins, target_frequency, Utc::now())
}

/// Drift score as of `now`.
pub fn compute_drift_at(
    checkins: &[CheckinEvent],
    target_frequency: u32,
    now: DateTime<Utc>,
) -> f64 {
    drift_breakdown_at(checkins, target_frequency, now).score
}

/// Factor breakdown as of `now`.
pub fn drift_breakdown_at(
    checkins: &[CheckinEvent],
    target_frequency: u32,
    now: DateTime<Utc>,
) -> DriftBreakdown {
    if checkins.is_empty() {
        return DriftBreakdown::default();
    }

    let recent = RecentWindow::from_checkins(checkins);
    let weekly = weekly_stats_at(checkins, target_frequency, now);

    let frequency_drift = 1.0 - weekly.this_week_rate;
    let completion_drift = 1.0 - recent.completion_rate();
    let friction_drift = ((recent.avg_friction() - 1.0) / 2.0).clamp(0.0, 1.0);
    let blocker_rate = recent.blocker_rate();

    let weighted = frequency_drift * FREQUENCY_WEIGHT
        + completion_drift * COMPLETION_WEIGHT
        + friction_drift * FRICTION_WEIGHT
        + blocker_rate * BLOCKER_WEIGHT;
    let score = weighted.clamp(0.0, 1.0);

    tracing::debug!(
        frequency_drift,
        completion_drift,
        friction_drift,
        blocker_rate,
        score,
        "computed drift"
    );

    DriftBreakdown {
        frequency_drift,
        completion_drift,
        friction_drift,
        blocker_rate,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::Friction;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
    }

    fn event(hours_ago: i64, done: bool, friction: u8) -> CheckinEvent {
        CheckinEvent::new(
            now() - Duration::hours(hours_ago),
            done,
            Friction::new(friction).unwrap(),
        )
    }

    #[test]
    fn weights_sum_to_one() {
        let total = FREQUENCY_WEIGHT + COMPLETION_WEIGHT + FRICTION_WEIGHT + BLOCKER_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_history_has_no_drift() {
        assert_eq!(compute_drift_at(&[], 3, now()), 0.0);
    }

    #[test]
    fn all_misses_with_high_friction() {
        let checkins: Vec<_> = (1..=5).map(|h| event(h, false, 3)).collect();
        let breakdown = drift_breakdown_at(&checkins, 5, now());
        assert_eq!(breakdown.frequency_drift, 1.0);
        assert_eq!(breakdown.completion_drift, 1.0);
        assert_eq!(breakdown.friction_drift, 1.0);
        assert_eq!(breakdown.blocker_rate, 0.0);
        assert!((breakdown.score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn only_the_five_newest_count_for_window_factors() {
        // Five fresh successes, then old misses with blockers.
        let mut checkins: Vec<_> = (1..=5).map(|h| event(h, true, 1)).collect();
        checkins.extend((10..=14).map(|h| event(h, false, 3).with_blocker("sick")));
        let breakdown = drift_breakdown_at(&checkins, 5, now());
        assert_eq!(breakdown.completion_drift, 0.0);
        assert_eq!(breakdown.friction_drift, 0.0);
        assert_eq!(breakdown.blocker_rate, 0.0);
        assert_eq!(breakdown.score, 0.0);
    }

    #[test]
    fn blockers_raise_drift() {
        let clean: Vec<_> = (1..=4).map(|h| event(h, true, 2)).collect();
        let blocked: Vec<_> = (1..=4)
            .map(|h| event(h, true, 2).with_blocker("travel"))
            .collect();
        let a = compute_drift_at(&clean, 4, now());
        let b = compute_drift_at(&blocked, 4, now());
        assert!((b - a - BLOCKER_WEIGHT).abs() < 1e-9);
    }
}
