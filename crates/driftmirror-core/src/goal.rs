//! Goals: the habit a user is tracking and the values its first plan starts
//! from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::plan::{PlanParameters, TimeWindow};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_WHY_LEN: usize = 500;
pub const MAX_MINIMUM_ACTION_LEN: usize = 300;

/// Framing used for generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMode {
    #[default]
    PersonalGrowth,
    Productivity,
}

impl GoalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalMode::PersonalGrowth => "personal_growth",
            GoalMode::Productivity => "productivity",
        }
    }
}

impl fmt::Display for GoalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "personal_growth" => Ok(GoalMode::PersonalGrowth),
            "productivity" => Ok(GoalMode::Productivity),
            other => Err(ValidationError::InvalidValue {
                field: "mode".into(),
                message: format!("'{other}' is not one of personal_growth, productivity"),
            }),
        }
    }
}

/// A stored goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub title: String,
    pub why: Option<String>,
    pub mode: GoalMode,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a goal together with its first plan version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGoal {
    pub title: String,
    pub why: Option<String>,
    pub mode: GoalMode,
    pub frequency_per_week: u32,
    pub min_minutes: u32,
    pub time_window: Option<TimeWindow>,
    pub minimum_action_text: Option<String>,
}

impl NewGoal {
    pub fn new(title: impl Into<String>, frequency_per_week: u32, min_minutes: u32) -> Self {
        Self {
            title: title.into(),
            why: None,
            mode: GoalMode::default(),
            frequency_per_week,
            min_minutes,
            time_window: None,
            minimum_action_text: None,
        }
    }

    /// Validate text lengths and plan bounds, returning the first plan.
    pub fn initial_plan(&self) -> Result<PlanParameters, ValidationError> {
        let title_len = self.title.trim().chars().count();
        if title_len == 0 {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "must not be empty".into(),
            });
        }
        check_len("title", title_len, MAX_TITLE_LEN)?;
        if let Some(why) = &self.why {
            check_len("why", why.chars().count(), MAX_WHY_LEN)?;
        }
        if let Some(text) = &self.minimum_action_text {
            check_len("minimum_action_text", text.chars().count(), MAX_MINIMUM_ACTION_LEN)?;
        }
        PlanParameters::initial(
            self.frequency_per_week,
            self.min_minutes,
            self.time_window,
            self.minimum_action_text.clone(),
        )
    }
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), ValidationError> {
    if len > max {
        Err(ValidationError::TooLong { field, len, max })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_both_spellings() {
        assert_eq!("personal-growth".parse::<GoalMode>().unwrap(), GoalMode::PersonalGrowth);
        assert_eq!("Productivity".parse::<GoalMode>().unwrap(), GoalMode::Productivity);
        assert!("fitness".parse::<GoalMode>().is_err());
    }

    #[test]
    fn initial_plan_checks_bounds() {
        assert!(NewGoal::new("Meditate", 3, 15).initial_plan().is_ok());
        assert!(NewGoal::new("Meditate", 0, 15).initial_plan().is_err());
        assert!(NewGoal::new("Meditate", 3, 2).initial_plan().is_err());
        assert!(NewGoal::new("   ", 3, 15).initial_plan().is_err());
    }

    #[test]
    fn long_why_is_rejected() {
        let mut goal = NewGoal::new("Read", 3, 15);
        goal.why = Some("x".repeat(501));
        assert_eq!(
            goal.initial_plan().unwrap_err(),
            ValidationError::TooLong {
                field: "why",
                len: 501,
                max: 500
            }
        );
    }
}
