//! Check-in events: one immutable self-report per submission.
//!
//! Only the structured `did_minimum_action` flag is kept. Older payloads that
//! carry a `completed` boolean are read through a serde alias so the two
//! representations never coexist in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum characters accepted for free-text check-in fields.
pub const MAX_TEXT_LEN: usize = 500;

/// Self-rated resistance, 1 (easy) to 3 (hard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Friction(u8);

impl Friction {
    pub const LOW: Friction = Friction(1);
    pub const MEDIUM: Friction = Friction(2);
    pub const HIGH: Friction = Friction(3);

    /// Build a friction rating, rejecting values outside 1..=3.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (1..=3).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::OutOfRange {
                field: "friction",
                value: value as i64,
                min: 1,
                max: 3,
            })
        }
    }

    /// Build a friction rating, clamping into 1..=3.
    ///
    /// Used when reading rows written before validation existed.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(1, 3) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Friction {
    fn default() -> Self {
        Friction::MEDIUM
    }
}

impl TryFrom<u8> for Friction {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Friction::new(value)
    }
}

impl From<Friction> for u8 {
    fn from(f: Friction) -> Self {
        f.0
    }
}

/// A single check-in as seen by the drift engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinEvent {
    /// When the check-in was submitted (UTC)
    pub timestamp: DateTime<Utc>,

    /// Whether the declared minimum action was done
    #[serde(alias = "completed")]
    pub did_minimum_action: bool,

    /// Self-rated resistance
    #[serde(default)]
    pub friction: Friction,

    /// What got in the way, if anything
    #[serde(default)]
    pub blocker: Option<String>,

    /// Anything done beyond the minimum
    #[serde(default)]
    pub extra_done: Option<String>,
}

impl CheckinEvent {
    pub fn new(timestamp: DateTime<Utc>, did_minimum_action: bool, friction: Friction) -> Self {
        Self {
            timestamp,
            did_minimum_action,
            friction,
            blocker: None,
            extra_done: None,
        }
    }

    pub fn with_blocker(mut self, blocker: impl Into<String>) -> Self {
        self.blocker = Some(blocker.into());
        self
    }

    pub fn with_extra_done(mut self, extra: impl Into<String>) -> Self {
        self.extra_done = Some(extra.into());
        self
    }

    /// A blocker counts only when it has non-whitespace text.
    pub fn has_blocker(&self) -> bool {
        self.blocker
            .as_deref()
            .map(|b| !b.trim().is_empty())
            .unwrap_or(false)
    }
}

/// User input for a new check-in, prior to validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckinDraft {
    pub did_minimum_action: bool,
    pub friction: u8,
    pub blocker: Option<String>,
    pub extra_done: Option<String>,
}

impl CheckinDraft {
    /// Validate the draft and stamp it with `timestamp`.
    pub fn into_event(self, timestamp: DateTime<Utc>) -> Result<CheckinEvent, ValidationError> {
        let friction = Friction::new(self.friction)?;
        let blocker = normalize_text("blocker", self.blocker)?;
        let extra_done = normalize_text("extra_done", self.extra_done)?;
        Ok(CheckinEvent {
            timestamp,
            did_minimum_action: self.did_minimum_action,
            friction,
            blocker,
            extra_done,
        })
    }
}

fn normalize_text(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    let Some(text) = value else {
        return Ok(None);
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let len = trimmed.chars().count();
    if len > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field,
            len,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friction_rejects_out_of_range() {
        assert!(Friction::new(0).is_err());
        assert!(Friction::new(4).is_err());
        assert_eq!(Friction::new(3).unwrap(), Friction::HIGH);
    }

    #[test]
    fn friction_clamps_legacy_values() {
        assert_eq!(Friction::clamped(-2), Friction::LOW);
        assert_eq!(Friction::clamped(9), Friction::HIGH);
    }

    #[test]
    fn blank_blocker_is_not_a_blocker() {
        let event = CheckinEvent::new(Utc::now(), true, Friction::LOW).with_blocker("   ");
        assert!(!event.has_blocker());
        let event = event.with_blocker("rain");
        assert!(event.has_blocker());
    }

    #[test]
    fn draft_normalizes_blank_text() {
        let draft = CheckinDraft {
            did_minimum_action: true,
            friction: 2,
            blocker: Some("  ".into()),
            extra_done: Some(" walked an extra mile ".into()),
        };
        let event = draft.into_event(Utc::now()).unwrap();
        assert_eq!(event.blocker, None);
        assert_eq!(event.extra_done.as_deref(), Some("walked an extra mile"));
    }

    #[test]
    fn draft_rejects_overlong_text() {
        let draft = CheckinDraft {
            did_minimum_action: false,
            friction: 1,
            blocker: Some("x".repeat(MAX_TEXT_LEN + 1)),
            extra_done: None,
        };
        assert!(matches!(
            draft.into_event(Utc::now()),
            Err(ValidationError::TooLong { field: "blocker", .. })
        ));
    }

    #[test]
    fn legacy_completed_field_reads_as_minimum_action() {
        let json = r#"{"timestamp":"2026-10-14T09:00:00Z","completed":true,"friction":1}"#;
        let event: CheckinEvent = serde_json::from_str(json).unwrap();
        assert!(event.did_minimum_action);
        assert_eq!(event.friction, Friction::LOW);
    }

    #[test]
    fn friction_out_of_range_fails_deserialization() {
        let json = r#"{"timestamp":"2026-10-14T09:00:00Z","did_minimum_action":true,"friction":7}"#;
        assert!(serde_json::from_str::<CheckinEvent>(json).is_err());
    }
}
