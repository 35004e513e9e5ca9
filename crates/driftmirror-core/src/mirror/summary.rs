//! Progress summaries: a look back over the whole journey of a goal, built
//! from the notes users leave on check-ins.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json::extract_json_object;
use super::report::ReportSource;
use crate::checkin::CheckinEvent;
use crate::error::GeneratorError;

/// Days of practice treated as the point where a habit has formed.
pub const HABIT_DAYS: i64 = 90;

/// Wins kept per summary.
pub const MAX_KEY_WINS: usize = 3;

pub const SUMMARY_SYSTEM: &str = "You are a supportive progress coach. Summarize a user's \
     check-in notes over time. Output ONLY valid JSON with no extra text.";

/// A check-in note on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressNote {
    pub date: NaiveDate,
    pub note: String,
    pub did_minimum_action: bool,
}

/// Everything a summary composer may look at.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryContext {
    pub goal_title: String,
    pub goal_why: Option<String>,
    /// Whole days since the goal was created, never negative
    pub days_tracked: i64,
    pub total_checkins: usize,
    /// Share of all check-ins with the minimum action done
    pub completion_rate: f64,
    /// Oldest first
    pub notes: Vec<ProgressNote>,
}

impl SummaryContext {
    /// Build from a goal's full history in any order.
    pub fn from_history(
        goal_title: impl Into<String>,
        goal_why: Option<String>,
        goal_created_at: DateTime<Utc>,
        history: &[CheckinEvent],
        now: DateTime<Utc>,
    ) -> Self {
        let total_checkins = history.len();
        let done = history.iter().filter(|c| c.did_minimum_action).count();
        let completion_rate = if total_checkins == 0 {
            0.0
        } else {
            done as f64 / total_checkins as f64
        };

        let mut oldest_first: Vec<&CheckinEvent> = history.iter().collect();
        oldest_first.sort_by_key(|c| c.timestamp);
        let notes = oldest_first
            .into_iter()
            .filter_map(|c| {
                let note = c.extra_done.as_deref()?.trim();
                (!note.is_empty()).then(|| ProgressNote {
                    date: c.timestamp.date_naive(),
                    note: note.to_string(),
                    did_minimum_action: c.did_minimum_action,
                })
            })
            .collect();

        Self {
            goal_title: goal_title.into(),
            goal_why,
            days_tracked: (now - goal_created_at).num_days().max(0),
            total_checkins,
            completion_rate,
            notes,
        }
    }

    pub fn days_to_habit(&self) -> u32 {
        days_to_habit(self.days_tracked)
    }
}

/// Days left until [`HABIT_DAYS`], floored at zero.
pub fn days_to_habit(days_tracked: i64) -> u32 {
    (HABIT_DAYS - days_tracked).clamp(0, HABIT_DAYS) as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub overall_progress: String,
    pub key_wins: Vec<String>,
    pub growth_observed: String,
    pub encouragement: String,
    pub days_to_habit: u32,
    pub source: ReportSource,
}

/// Summary from counts alone. Never fails.
pub fn compose_summary_deterministic(ctx: &SummaryContext) -> ProgressSummary {
    let total = ctx.total_checkins;
    let days_to_habit = ctx.days_to_habit();
    let percent = (ctx.completion_rate * 100.0).round() as u32;

    let (overall_progress, key_wins, growth_observed, encouragement) = if total == 0 {
        (
            "The goal and its plan are in place. Nothing has been logged yet.".to_string(),
            vec!["Set a goal and a plan to go with it".to_string()],
            "Deciding what matters is the first piece of the work.".to_string(),
            "A first check-in today starts the record.".to_string(),
        )
    } else if ctx.completion_rate >= 0.8 {
        (
            format!("{total} check-ins so far with the minimum action done {percent}% of the time."),
            vec![
                "Kept a steady rhythm".to_string(),
                format!("Logged {total} check-ins"),
                "Laid down a reliable base".to_string(),
            ],
            "Consistency is the clearest pattern in this record.".to_string(),
            format!("{days_to_habit} days remain until the {HABIT_DAYS}-day mark."),
        )
    } else if ctx.completion_rate >= 0.5 {
        (
            format!("{total} check-ins so far, and momentum is building."),
            vec![
                format!("Tracked progress {total} times"),
                "Kept showing up".to_string(),
            ],
            "The record shows learning what works and adjusting to it.".to_string(),
            format!("{} days in. Each check-in adds to the picture.", ctx.days_tracked),
        )
    } else {
        (
            format!("{total} check-ins so far. Progress rarely moves in a straight line."),
            vec![
                "Showed up and logged honestly".to_string(),
                "Kept the record going through harder days".to_string(),
            ],
            "Naming what gets in the way is where change starts.".to_string(),
            "The minimum action is enough. Two minutes still counts.".to_string(),
        )
    };

    ProgressSummary {
        overall_progress,
        key_wins,
        growth_observed,
        encouragement,
        days_to_habit,
        source: ReportSource::Deterministic,
    }
}

/// Prompt text for a progress summary.
pub fn build_summary_prompt(ctx: &SummaryContext) -> String {
    let mut prompt = String::from("Summarize this user's progress toward their goal:\n\n");
    let _ = writeln!(prompt, "Goal: {}", ctx.goal_title);
    let _ = writeln!(prompt, "Why: {}", ctx.goal_why.as_deref().unwrap_or("not stated"));
    let _ = writeln!(prompt, "Days tracked: {}", ctx.days_tracked);
    let _ = writeln!(prompt, "Total check-ins: {}", ctx.total_checkins);
    let _ = writeln!(
        prompt,
        "Completion rate: {}%",
        (ctx.completion_rate * 100.0).round() as u32
    );

    prompt.push_str("\nCheck-in notes, oldest to newest:\n");
    for (i, note) in ctx.notes.iter().enumerate() {
        let mark = if note.did_minimum_action { "done" } else { "missed" };
        let _ = writeln!(prompt, "Day {} ({}): [{mark}] {}", i + 1, note.date, note.note);
    }

    let _ = write!(
        prompt,
        r#"
Create a progress summary in this exact JSON format:
{{
  "overall_progress": "2-3 sentence summary of the journey",
  "key_wins": ["specific achievement 1", "specific achievement 2", "specific achievement 3"],
  "growth_observed": "growth or improvement visible in the notes",
  "encouragement": "a specific, personal encouragement"
}}

Rules:
- Warm and specific, never judgmental
- Refer to things mentioned in the notes
- At most {MAX_KEY_WINS} key_wins, each a concrete achievement from the notes
- {days} days remain until the {HABIT_DAYS}-day habit mark

Output only the JSON."#,
        days = ctx.days_to_habit(),
    );
    prompt
}

/// Parse a model answer into a summary. `days_to_habit` is always computed
/// locally.
pub fn parse_summary(raw: &str, ctx: &SummaryContext) -> Result<ProgressSummary, GeneratorError> {
    if raw.trim().is_empty() {
        return Err(GeneratorError::EmptyResponse);
    }
    let map = extract_json_object(raw)
        .ok_or_else(|| GeneratorError::Unparseable("no JSON object in response".into()))?;

    let text_field = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let overall_progress = text_field("overall_progress")
        .ok_or_else(|| GeneratorError::Unparseable("missing 'overall_progress'".into()))?;
    let key_wins = map
        .get("key_wins")
        .and_then(Value::as_array)
        .map(|wins| {
            wins.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .take(MAX_KEY_WINS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ProgressSummary {
        overall_progress,
        key_wins,
        growth_observed: text_field("growth_observed").unwrap_or_default(),
        encouragement: text_field("encouragement").unwrap_or_default(),
        days_to_habit: ctx.days_to_habit(),
        source: ReportSource::Generated,
    })
}
