//! Versioned plan parameters.
//!
//! A goal's plan is an append-only sequence of snapshots. The current plan is
//! always the highest version; adjustments produce a new version that
//! inherits every field they do not name.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adjust::PlanChanges;
use crate::error::ValidationError;

/// Lowest session length a plan may carry.
pub const MIN_MINUTES_FLOOR: u32 = 5;
/// Highest session length a plan may carry.
pub const MIN_MINUTES_CEILING: u32 = 120;
/// Lowest weekly frequency a plan may carry.
pub const FREQUENCY_FLOOR: u32 = 1;
/// Highest weekly frequency a plan may carry.
pub const FREQUENCY_CEILING: u32 = 7;

/// Preferred part of the day for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeWindow {
    /// Canonical rotation order.
    pub const CYCLE: [TimeWindow; 4] = [
        TimeWindow::Morning,
        TimeWindow::Afternoon,
        TimeWindow::Evening,
        TimeWindow::Night,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Morning => "morning",
            TimeWindow::Afternoon => "afternoon",
            TimeWindow::Evening => "evening",
            TimeWindow::Night => "night",
        }
    }

    /// Next window in the cycle, wrapping from night to morning.
    pub fn next(self) -> TimeWindow {
        let idx = Self::CYCLE.iter().position(|w| *w == self).unwrap_or(0);
        Self::CYCLE[(idx + 1) % Self::CYCLE.len()]
    }

    /// Rotate from an optional current window. A missing window counts as
    /// the first entry of the cycle.
    pub fn rotate_from(current: Option<TimeWindow>) -> TimeWindow {
        current.unwrap_or(Self::CYCLE[0]).next()
    }

    /// Parse stored text, falling back to the first window for unknown values.
    pub fn parse_lenient(raw: &str) -> TimeWindow {
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(value = raw, "unknown time window, treating as morning");
            Self::CYCLE[0]
        })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(TimeWindow::Morning),
            "afternoon" => Ok(TimeWindow::Afternoon),
            "evening" => Ok(TimeWindow::Evening),
            "night" => Ok(TimeWindow::Night),
            other => Err(ValidationError::InvalidValue {
                field: "time_window".into(),
                message: format!("'{other}' is not one of morning, afternoon, evening, night"),
            }),
        }
    }
}

/// One immutable snapshot of a goal's target behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanParameters {
    /// Monotonic version, starting at 1
    pub version: u32,
    /// Target sessions per week
    pub frequency_per_week: u32,
    /// Target minutes per session
    pub min_minutes: u32,
    /// Preferred part of the day
    pub time_window: Option<TimeWindow>,
    /// The user's own wording of their minimum action
    pub minimum_action_text: Option<String>,
    /// Rationale of the change that produced this version
    pub recovery_step: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PlanParameters {
    /// First version of a plan. Frequency and duration must be in range.
    pub fn initial(
        frequency_per_week: u32,
        min_minutes: u32,
        time_window: Option<TimeWindow>,
        minimum_action_text: Option<String>,
    ) -> Result<Self, ValidationError> {
        check_frequency(frequency_per_week)?;
        check_minutes(min_minutes)?;
        Ok(Self {
            version: 1,
            frequency_per_week,
            min_minutes,
            time_window,
            minimum_action_text,
            recovery_step: None,
            created_at: Utc::now(),
        })
    }

    /// Build the successor version. Fields absent from `changes` are
    /// inherited unchanged; the `simplify_minimum_action` flag carries no
    /// plan field and is ignored here.
    pub fn next_version(&self, changes: &PlanChanges, recovery_step: impl Into<String>) -> Self {
        Self {
            version: self.version + 1,
            frequency_per_week: changes.frequency_per_week.unwrap_or(self.frequency_per_week),
            min_minutes: changes.min_minutes.unwrap_or(self.min_minutes),
            time_window: changes.time_window.or(self.time_window),
            minimum_action_text: self.minimum_action_text.clone(),
            recovery_step: Some(recovery_step.into()),
            created_at: Utc::now(),
        }
    }
}

pub(crate) fn check_frequency(value: u32) -> Result<(), ValidationError> {
    if (FREQUENCY_FLOOR..=FREQUENCY_CEILING).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: "frequency_per_week",
            value: value as i64,
            min: FREQUENCY_FLOOR as i64,
            max: FREQUENCY_CEILING as i64,
        })
    }
}

pub(crate) fn check_minutes(value: u32) -> Result<(), ValidationError> {
    if (MIN_MINUTES_FLOOR..=MIN_MINUTES_CEILING).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: "min_minutes",
            value: value as i64,
            min: MIN_MINUTES_FLOOR as i64,
            max: MIN_MINUTES_CEILING as i64,
        })
    }
}

/// Append-only version log for a single goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanHistory {
    versions: Vec<PlanParameters>,
}

impl PlanHistory {
    pub fn new(initial: PlanParameters) -> Self {
        Self {
            versions: vec![initial],
        }
    }

    /// Rebuild from stored rows in any order.
    pub fn from_versions(mut versions: Vec<PlanParameters>) -> Self {
        versions.sort_by_key(|p| p.version);
        Self { versions }
    }

    /// The current plan: the highest version.
    pub fn latest(&self) -> Option<&PlanParameters> {
        self.versions.last()
    }

    pub fn versions(&self) -> &[PlanParameters] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Supersede the current plan. Returns `None` when there is no current
    /// plan or the changes name no plan field.
    pub fn append(
        &mut self,
        changes: &PlanChanges,
        recovery_step: impl Into<String>,
    ) -> Option<&PlanParameters> {
        if !changes.has_parameter_changes() {
            return None;
        }
        let next = self.latest()?.next_version(changes, recovery_step);
        self.versions.push(next);
        self.versions.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> PlanParameters {
        PlanParameters::initial(4, 20, Some(TimeWindow::Evening), Some("Put on shoes".into()))
            .unwrap()
    }

    #[test]
    fn time_window_cycle_wraps() {
        assert_eq!(TimeWindow::Morning.next(), TimeWindow::Afternoon);
        assert_eq!(TimeWindow::Night.next(), TimeWindow::Morning);
    }

    #[test]
    fn missing_window_rotates_from_first_entry() {
        assert_eq!(TimeWindow::rotate_from(None), TimeWindow::Afternoon);
    }

    #[test]
    fn unknown_window_parses_as_morning() {
        assert_eq!(TimeWindow::parse_lenient("lunchtime"), TimeWindow::Morning);
        assert_eq!(TimeWindow::parse_lenient(" Evening "), TimeWindow::Evening);
    }

    #[test]
    fn initial_rejects_out_of_range_values() {
        assert!(PlanParameters::initial(0, 20, None, None).is_err());
        assert!(PlanParameters::initial(8, 20, None, None).is_err());
        assert!(PlanParameters::initial(3, 4, None, None).is_err());
        assert!(PlanParameters::initial(3, 121, None, None).is_err());
    }

    #[test]
    fn next_version_inherits_unspecified_fields() {
        let current = plan();
        let changes = PlanChanges {
            min_minutes: Some(15),
            ..Default::default()
        };
        let next = current.next_version(&changes, "Shorter sessions");

        assert_eq!(next.version, 2);
        assert_eq!(next.min_minutes, 15);
        assert_eq!(next.frequency_per_week, current.frequency_per_week);
        assert_eq!(next.time_window, current.time_window);
        assert_eq!(next.minimum_action_text, current.minimum_action_text);
        assert_eq!(next.recovery_step.as_deref(), Some("Shorter sessions"));
    }

    #[test]
    fn history_ignores_flag_only_changes() {
        let mut history = PlanHistory::new(plan());
        let changes = PlanChanges {
            simplify_minimum_action: true,
            ..Default::default()
        };
        assert!(history.append(&changes, "easier").is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn history_latest_is_highest_version() {
        let mut history = PlanHistory::new(plan());
        let changes = PlanChanges {
            frequency_per_week: Some(3),
            ..Default::default()
        };
        history.append(&changes, "fewer sessions").unwrap();
        history.append(&changes, "again").unwrap();

        assert_eq!(history.latest().unwrap().version, 3);

        let reversed: Vec<_> = history.versions().iter().rev().cloned().collect();
        let rebuilt = PlanHistory::from_versions(reversed);
        assert_eq!(rebuilt.latest().unwrap().version, 3);
    }
}
