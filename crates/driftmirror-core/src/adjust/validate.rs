//! Validation of plan changes that arrive from outside the policy, such as a
//! suggestion payload echoed back by a client.

use serde_json::{Map, Value};

use super::PlanChanges;
use crate::error::ValidationError;
use crate::plan::{check_frequency, check_minutes, TimeWindow};
use crate::plan::{FREQUENCY_CEILING, FREQUENCY_FLOOR, MIN_MINUTES_CEILING, MIN_MINUTES_FLOOR};

/// Words a rationale must never contain.
pub const FORBIDDEN_RATIONALE_WORDS: [&str; 4] =
    ["reduced", "downgraded", "failed", "underperformed"];

/// Check every present field against the plan bounds.
pub fn validate_changes(changes: &PlanChanges) -> Result<(), ValidationError> {
    if let Some(frequency) = changes.frequency_per_week {
        check_frequency(frequency)?;
    }
    if let Some(minutes) = changes.min_minutes {
        check_minutes(minutes)?;
    }
    Ok(())
}

impl PlanChanges {
    /// Parse and validate an untyped change map.
    ///
    /// Unknown keys, wrong types and out-of-range values are rejected; the
    /// payload is never applied verbatim.
    pub fn from_untyped(map: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut changes = PlanChanges::default();
        for (key, value) in map {
            match key.as_str() {
                "frequency_per_week" => {
                    changes.frequency_per_week = Some(integer_in(
                        "frequency_per_week",
                        value,
                        FREQUENCY_FLOOR,
                        FREQUENCY_CEILING,
                    )?);
                }
                "min_minutes" => {
                    changes.min_minutes = Some(integer_in(
                        "min_minutes",
                        value,
                        MIN_MINUTES_FLOOR,
                        MIN_MINUTES_CEILING,
                    )?);
                }
                "time_window" => {
                    let raw = value.as_str().ok_or_else(|| wrong_type("time_window", "a string"))?;
                    changes.time_window = Some(raw.parse::<TimeWindow>()?);
                }
                "simplify_minimum_action" => {
                    changes.simplify_minimum_action = value
                        .as_bool()
                        .ok_or_else(|| wrong_type("simplify_minimum_action", "a boolean"))?;
                }
                other => return Err(ValidationError::UnknownField(other.to_string())),
            }
        }
        validate_changes(&changes)?;
        Ok(changes)
    }
}

fn integer_in(field: &'static str, value: &Value, min: u32, max: u32) -> Result<u32, ValidationError> {
    let raw = value
        .as_i64()
        .ok_or_else(|| wrong_type(field, "an integer"))?;
    if raw < min as i64 || raw > max as i64 {
        return Err(ValidationError::OutOfRange {
            field,
            value: raw,
            min: min as i64,
            max: max as i64,
        });
    }
    Ok(raw as u32)
}

fn wrong_type(field: &str, expected: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("expected {expected}"),
    }
}
