//! Weekly frequency tracking.
//!
//! Counts qualifying check-ins in the current and previous calendar week
//! (weeks start Monday 00:00 UTC) and classifies the trend between them.
//! Only check-ins where the minimum action was done count; missed check-ins
//! were still submitted but do not move the weekly total.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkin::CheckinEvent;

/// Rate difference needed before the trend leaves `Stable`.
pub const TREND_MARGIN: f64 = 0.1;

/// Week-over-week direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    fn classify(this_week_rate: f64, last_week_rate: f64) -> Self {
        if this_week_rate > last_week_rate + TREND_MARGIN {
            Trend::Improving
        } else if this_week_rate < last_week_rate - TREND_MARGIN {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}

/// Derived weekly metrics. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftMetrics {
    /// Qualifying check-ins since Monday 00:00 UTC
    pub this_week_count: u32,
    /// Target sessions for the week
    pub this_week_target: u32,
    /// `this_week_count / target`, capped at 1.0
    pub this_week_rate: f64,
    /// Qualifying check-ins in the previous week
    pub last_week_count: u32,
    /// `last_week_count / target`, capped at 1.0
    pub last_week_rate: f64,
    pub trend: Trend,
    /// Whole days since the newest check-in
    pub days_since_last_checkin: Option<i64>,
}

impl DriftMetrics {
    fn empty(target: u32) -> Self {
        Self {
            this_week_count: 0,
            this_week_target: target,
            this_week_rate: 0.0,
            last_week_count: 0,
            last_week_rate: 0.0,
            trend: Trend::Stable,
            days_since_last_checkin: None,
        }
    }
}

/// Monday 00:00:00 UTC of the week containing `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = now.weekday().num_days_from_monday() as i64;
    let monday = now.date_naive() - Duration::days(days_from_monday);
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// Completion rate against a weekly target, capped at 1.0.
///
/// A zero target yields 0.0 rather than dividing by zero.
pub fn weekly_rate(count: u32, target: u32) -> f64 {
    if target == 0 {
        return 0.0;
    }
    (count as f64 / target as f64).min(1.0)
}

/// Weekly statistics as of now.
pub fn weekly_stats(checkins: &[CheckinEvent], target_frequency: u32) -> DriftMetrics {
    weekly_stats_at(checkins, target_frequency, Utc::now())
}

/// Weekly statistics as of `now`.
pub fn weekly_stats_at(
    checkins: &[CheckinEvent],
    target_frequency: u32,
    now: DateTime<Utc>,
) -> DriftMetrics {
    if checkins.is_empty() {
        return DriftMetrics::empty(target_frequency);
    }

    let this_monday = week_start(now);
    let last_monday = this_monday - Duration::days(7);

    let mut this_week_count = 0u32;
    let mut last_week_count = 0u32;
    for c in checkins.iter().filter(|c| c.did_minimum_action) {
        if c.timestamp >= this_monday && c.timestamp <= now {
            this_week_count += 1;
        } else if c.timestamp >= last_monday && c.timestamp < this_monday {
            last_week_count += 1;
        }
    }

    let this_week_rate = weekly_rate(this_week_count, target_frequency);
    let last_week_rate = weekly_rate(last_week_count, target_frequency);

    let days_since_last_checkin = checkins
        .iter()
        .map(|c| c.timestamp)
        .max()
        .map(|last| (now - last).num_days().max(0));

    DriftMetrics {
        this_week_count,
        this_week_target: target_frequency,
        this_week_rate,
        last_week_count,
        last_week_rate,
        trend: Trend::classify(this_week_rate, last_week_rate),
        days_since_last_checkin,
    }
}
