//! Human-readable explanation of which drift conditions fired.
//!
//! The output is diagnostic: it is shown to users and stored with mirror
//! reports, but nothing branches on it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::frequency::{weekly_stats_at, Trend};
use super::window::RecentWindow;
use crate::checkin::CheckinEvent;

/// One fired rule. Displays as its string tag, e.g. `gap_detected:4_days`.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleTag {
    NoCheckins,
    BelowWeeklyTarget { count: u32, target: u32 },
    DecliningFrequency,
    GapDetected { days: i64 },
    LowCompletionRate { rate: f64 },
    HighFriction { avg: f64 },
    RepeatedBlockers { count: usize },
    SignificantDrift,
    ModerateDrift,
    OnTrack,
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTag::NoCheckins => f.write_str("no_checkins"),
            RuleTag::BelowWeeklyTarget { count, target } => {
                write!(f, "below_weekly_target:{count}/{target}")
            }
            RuleTag::DecliningFrequency => f.write_str("declining_frequency"),
            RuleTag::GapDetected { days } => write!(f, "gap_detected:{days}_days"),
            RuleTag::LowCompletionRate { rate } => {
                write!(f, "low_completion_rate:{:.0}%", rate * 100.0)
            }
            RuleTag::HighFriction { avg } => write!(f, "high_friction:{avg:.2}"),
            RuleTag::RepeatedBlockers { count } => write!(f, "repeated_blockers:{count}"),
            RuleTag::SignificantDrift => f.write_str("significant_drift"),
            RuleTag::ModerateDrift => f.write_str("moderate_drift"),
            RuleTag::OnTrack => f.write_str("on_track"),
        }
    }
}

impl Serialize for RuleTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rules that fired as of now.
pub fn explain_rules(
    drift_score: f64,
    checkins: &[CheckinEvent],
    target_frequency: u32,
) -> Vec<RuleTag> {
    explain_rules_at(drift_score, checkins, target_frequency, Utc::now())
}

/// Rules that fired as of `now`, in evaluation order.
pub fn explain_rules_at(
    drift_score: f64,
    checkins: &[CheckinEvent],
    target_frequency: u32,
    now: DateTime<Utc>,
) -> Vec<RuleTag> {
    if checkins.is_empty() {
        return vec![RuleTag::NoCheckins];
    }

    let mut rules = Vec::new();
    let weekly = weekly_stats_at(checkins, target_frequency, now);
    let recent = RecentWindow::from_checkins(checkins);

    if weekly.this_week_rate < 0.5 {
        rules.push(RuleTag::BelowWeeklyTarget {
            count: weekly.this_week_count,
            target: weekly.this_week_target,
        });
    }
    if weekly.trend == Trend::Declining {
        rules.push(RuleTag::DecliningFrequency);
    }
    if let Some(days) = weekly.days_since_last_checkin.filter(|d| *d >= 3) {
        rules.push(RuleTag::GapDetected { days });
    }

    let completion_rate = recent.completion_rate();
    if completion_rate < 0.5 {
        rules.push(RuleTag::LowCompletionRate {
            rate: completion_rate,
        });
    }
    let avg_friction = recent.avg_friction();
    if avg_friction > 2.0 {
        rules.push(RuleTag::HighFriction { avg: avg_friction });
    }
    let blocker_count = recent.blocker_count();
    if blocker_count >= 2 {
        rules.push(RuleTag::RepeatedBlockers {
            count: blocker_count,
        });
    }

    if drift_score > 0.6 {
        rules.push(RuleTag::SignificantDrift);
    } else if drift_score > 0.4 {
        rules.push(RuleTag::ModerateDrift);
    }

    if rules.is_empty() {
        rules.push(RuleTag::OnTrack);
    }
    rules
}

/// String form of a rule list, for storage and display.
pub fn rule_strings(rules: &[RuleTag]) -> Vec<String> {
    rules.iter().map(ToString::to_string).collect()
}
