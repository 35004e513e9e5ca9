//! SQLite storage for goals, check-ins and their derived records.
//!
//! Provides persistent storage for:
//! - Goals and their append-only plan versions
//! - Check-ins and the signals extracted from them
//! - Mirror reports, report feedback and insight actions
//! - Rate limit hits
//!
//! Plans are never updated in place. The current plan is the highest version
//! for a goal, and `append_plan` only accepts `latest + 1`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::migrations;
use crate::adjust::{PlanChanges, SuggestionKind};
use crate::checkin::{CheckinEvent, Friction};
use crate::error::{CoreError, DatabaseError, Result};
use crate::goal::{Goal, GoalMode, NewGoal};
use crate::mirror::{Finding, MirrorReport, ReportSource, Signal, SignalKind};
use crate::plan::{PlanHistory, PlanParameters, TimeWindow};
use crate::rate_limit::RateDecision;

const DB_FILE: &str = "driftmirror.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A check-in as stored, with its row id.
#[derive(Debug, Clone, Serialize)]
pub struct StoredCheckin {
    pub id: i64,
    pub goal_id: i64,
    #[serde(flatten)]
    pub event: CheckinEvent,
}

/// A mirror report as stored, with its row id.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub id: i64,
    pub goal_id: i64,
    #[serde(flatten)]
    pub report: MirrorReport,
}

/// What the user did with a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightActionKind {
    Accepted,
    Dismissed,
}

impl InsightActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InsightActionKind::Accepted => "accepted",
            InsightActionKind::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightAction {
    pub id: i64,
    pub goal_id: i64,
    pub suggestion_kind: SuggestionKind,
    pub action: InsightActionKind,
    pub suggested_changes: PlanChanges,
    pub mirror_report_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackSummary {
    pub helpful: u32,
    pub not_helpful: u32,
}

/// SQLite database for goal tracking.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// `<data_dir>/driftmirror.db`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join(DB_FILE))
    }

    /// Open the database in the data directory.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_path()?)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Run `f` inside `BEGIN IMMEDIATE`, committing on success and rolling
    /// back on error.
    ///
    /// The write lock is taken up front, so two processes cannot both read
    /// the same current plan and append the same next version.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT;")?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    // === Goals ===

    /// Insert a goal together with plan version 1.
    pub fn create_goal(&self, new_goal: &NewGoal) -> Result<(Goal, PlanParameters)> {
        let plan = new_goal.initial_plan()?;
        self.in_transaction(|db| {
            let created_at = Utc::now();
            db.conn.execute(
                "INSERT INTO goals (title, why, mode, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    new_goal.title.trim(),
                    new_goal.why.as_deref().map(str::trim).filter(|w| !w.is_empty()),
                    new_goal.mode.as_str(),
                    ts(created_at),
                ],
            )?;
            let goal_id = db.conn.last_insert_rowid();
            db.append_plan(goal_id, &plan)?;
            tracing::info!(goal_id, "goal created");
            Ok((db.get_goal(goal_id)?, plan.clone()))
        })
    }

    pub fn get_goal(&self, goal_id: i64) -> Result<Goal> {
        self.conn
            .query_row(
                "SELECT id, title, why, mode, created_at FROM goals WHERE id = ?1",
                params![goal_id],
                goal_from_row,
            )
            .optional()?
            .ok_or(CoreError::NotFound {
                entity: "goal",
                id: goal_id,
            })
    }

    pub fn list_goals(&self) -> Result<Vec<Goal>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, why, mode, created_at FROM goals ORDER BY id")?;
        let goals = stmt
            .query_map([], goal_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(goals)
    }

    // === Check-ins ===

    pub fn record_checkin(&self, goal_id: i64, event: &CheckinEvent) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO checkins (goal_id, did_minimum_action, friction, blocker, extra_done, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                goal_id,
                event.did_minimum_action,
                event.friction.value(),
                event.blocker,
                event.extra_done,
                ts(event.timestamp),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Check-ins for a goal, newest first. `None` loads the whole history.
    pub fn checkins(&self, goal_id: i64, limit: Option<usize>) -> Result<Vec<StoredCheckin>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, goal_id, did_minimum_action, friction, blocker, extra_done, occurred_at
             FROM checkins
             WHERE goal_id = ?1
             ORDER BY occurred_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![goal_id, sql_limit(limit)], |row| {
                Ok(StoredCheckin {
                    id: row.get(0)?,
                    goal_id: row.get(1)?,
                    event: CheckinEvent {
                        did_minimum_action: row.get(2)?,
                        friction: Friction::clamped(row.get(3)?),
                        blocker: row.get(4)?,
                        extra_done: row.get(5)?,
                        timestamp: parse_ts(6, row.get(6)?)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Just the events, newest first.
    pub fn checkin_events(&self, goal_id: i64, limit: Option<usize>) -> Result<Vec<CheckinEvent>> {
        Ok(self
            .checkins(goal_id, limit)?
            .into_iter()
            .map(|c| c.event)
            .collect())
    }

    // === Plans ===

    pub fn latest_plan(&self, goal_id: i64) -> Result<PlanParameters> {
        self.conn
            .query_row(
                "SELECT version, frequency_per_week, min_minutes, time_window,
                        minimum_action_text, recovery_step, created_at
                 FROM plans WHERE goal_id = ?1
                 ORDER BY version DESC LIMIT 1",
                params![goal_id],
                plan_from_row,
            )
            .optional()?
            .ok_or(CoreError::NotFound {
                entity: "plan for goal",
                id: goal_id,
            })
    }

    pub fn plan_history(&self, goal_id: i64) -> Result<PlanHistory> {
        let mut stmt = self.conn.prepare(
            "SELECT version, frequency_per_week, min_minutes, time_window,
                    minimum_action_text, recovery_step, created_at
             FROM plans WHERE goal_id = ?1
             ORDER BY version",
        )?;
        let versions = stmt
            .query_map(params![goal_id], plan_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(PlanHistory::from_versions(versions))
    }

    /// Append a plan version. The version must be exactly one past the
    /// current highest (or 1 for a goal with no plan yet).
    pub fn append_plan(&self, goal_id: i64, plan: &PlanParameters) -> Result<()> {
        let current: Option<u32> = self.conn.query_row(
            "SELECT MAX(version) FROM plans WHERE goal_id = ?1",
            params![goal_id],
            |row| row.get(0),
        )?;
        let expected = current.map_or(1, |v| v + 1);
        if plan.version != expected {
            return Err(DatabaseError::VersionConflict {
                goal_id,
                expected,
                actual: plan.version,
            }
            .into());
        }

        self.conn.execute(
            "INSERT INTO plans (goal_id, version, frequency_per_week, min_minutes, time_window,
                                minimum_action_text, recovery_step, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                goal_id,
                plan.version,
                plan.frequency_per_week,
                plan.min_minutes,
                plan.time_window.map(TimeWindow::as_str),
                plan.minimum_action_text,
                plan.recovery_step,
                ts(plan.created_at),
            ],
        )?;
        tracing::info!(goal_id, version = plan.version, "plan version appended");
        Ok(())
    }

    // === Signals ===

    pub fn record_signals(&self, checkin_id: i64, signals: &[Signal]) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO signals (checkin_id, kind, content, severity) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for signal in signals {
            stmt.execute(params![
                checkin_id,
                signal.kind.as_str(),
                signal.content,
                signal.severity
            ])?;
        }
        Ok(())
    }

    /// Signals of a goal's check-ins, newest check-in first.
    pub fn recent_signals(&self, goal_id: i64, limit: Option<usize>) -> Result<Vec<Signal>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.kind, s.content, s.severity
             FROM signals s JOIN checkins c ON c.id = s.checkin_id
             WHERE c.goal_id = ?1
             ORDER BY c.occurred_at DESC, c.id DESC, s.id ASC
             LIMIT ?2",
        )?;
        let signals = stmt
            .query_map(params![goal_id, sql_limit(limit)], |row| {
                let kind: String = row.get(0)?;
                Ok(Signal {
                    kind: kind.parse::<SignalKind>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                    })?,
                    content: row.get(1)?,
                    severity: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(signals)
    }

    // === Mirror reports ===

    pub fn save_report(&self, goal_id: i64, report: &MirrorReport) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO mirror_reports (goal_id, findings, counterfactual, drift_score, created_at,
                                         rules_applied, recurring_blockers, strength_pattern, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                goal_id,
                serde_json::to_string(&report.findings)?,
                report.counterfactual,
                report.drift_score,
                ts(report.created_at),
                serde_json::to_string(&report.rules_applied)?,
                serde_json::to_string(&report.recurring_blockers)?,
                report.strength_pattern,
                report.source.as_str(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(goal_id, report_id = id, source = report.source.as_str(), "mirror report saved");
        Ok(id)
    }

    pub fn latest_report(&self, goal_id: i64) -> Result<Option<StoredReport>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, goal_id, findings, counterfactual, drift_score, created_at,
                        rules_applied, recurring_blockers, strength_pattern, source
                 FROM mirror_reports WHERE goal_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![goal_id],
                report_from_row,
            )
            .optional()?)
    }

    pub fn get_report(&self, report_id: i64) -> Result<StoredReport> {
        self.conn
            .query_row(
                "SELECT id, goal_id, findings, counterfactual, drift_score, created_at,
                        rules_applied, recurring_blockers, strength_pattern, source
                 FROM mirror_reports WHERE id = ?1",
                params![report_id],
                report_from_row,
            )
            .optional()?
            .ok_or(CoreError::NotFound {
                entity: "mirror report",
                id: report_id,
            })
    }

    // === Feedback and insight actions ===

    pub fn record_feedback(&self, report_id: i64, helpful: bool) -> Result<i64> {
        self.get_report(report_id)?;
        self.conn.execute(
            "INSERT INTO feedback (mirror_report_id, helpful, created_at) VALUES (?1, ?2, ?3)",
            params![report_id, helpful, ts(Utc::now())],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn feedback_summary(&self, report_id: i64) -> Result<FeedbackSummary> {
        let (helpful, not_helpful) = self.conn.query_row(
            "SELECT COALESCE(SUM(helpful), 0), COALESCE(SUM(1 - helpful), 0)
             FROM feedback WHERE mirror_report_id = ?1",
            params![report_id],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
        )?;
        Ok(FeedbackSummary {
            helpful,
            not_helpful,
        })
    }

    pub fn record_insight_action(
        &self,
        goal_id: i64,
        kind: SuggestionKind,
        action: InsightActionKind,
        changes: &PlanChanges,
        mirror_report_id: Option<i64>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO insight_actions (goal_id, suggestion_kind, action, suggested_changes,
                                          mirror_report_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                goal_id,
                kind.as_str(),
                action.as_str(),
                serde_json::to_string(changes)?,
                mirror_report_id,
                ts(Utc::now()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insight_actions(&self, goal_id: i64) -> Result<Vec<InsightAction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, goal_id, suggestion_kind, action, suggested_changes, mirror_report_id, created_at
             FROM insight_actions WHERE goal_id = ?1 ORDER BY id",
        )?;
        let actions = stmt
            .query_map(params![goal_id], |row| {
                let kind: String = row.get(2)?;
                let action: String = row.get(3)?;
                Ok(InsightAction {
                    id: row.get(0)?,
                    goal_id: row.get(1)?,
                    suggestion_kind: kind.parse().map_err(|e: crate::error::ValidationError| {
                        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                    })?,
                    action: if action == "accepted" {
                        InsightActionKind::Accepted
                    } else {
                        InsightActionKind::Dismissed
                    },
                    suggested_changes: parse_json(4, row.get(4)?)?,
                    mirror_report_id: row.get(5)?,
                    created_at: parse_ts(6, row.get(6)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(actions)
    }

    // === Rate limiting ===

    /// Sliding-window check-and-increment over `rate_limit_hits`.
    pub fn rate_limit_hit(
        &self,
        key: &str,
        max_requests: u32,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<RateDecision> {
        self.in_transaction(|db| {
            db.conn.execute(
                "DELETE FROM rate_limit_hits WHERE key = ?1 AND hit_at <= ?2",
                params![key, ts(now - window)],
            )?;
            let (count, oldest): (i64, Option<String>) = db.conn.query_row(
                "SELECT COUNT(*), MIN(hit_at) FROM rate_limit_hits WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let oldest = oldest.map(|raw| parse_ts(1, raw)).transpose()?;

            let decision = RateDecision::from_window(count as usize, oldest, max_requests, window, now);
            if decision.allowed {
                db.conn.execute(
                    "INSERT INTO rate_limit_hits (key, hit_at) VALUES (?1, ?2)",
                    params![key, ts(now)],
                )?;
            }
            Ok(decision)
        })
    }
}

/// Fixed-width UTC timestamps so text order matches time order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: String) -> rusqlite::Result<T> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite treats a negative LIMIT as no limit.
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| l as i64)
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    let mode: String = row.get(3)?;
    Ok(Goal {
        id: row.get(0)?,
        title: row.get(1)?,
        why: row.get(2)?,
        mode: mode.parse().unwrap_or_else(|_| {
            tracing::warn!(mode = %mode, "unknown goal mode, using default");
            GoalMode::default()
        }),
        created_at: parse_ts(4, row.get(4)?)?,
    })
}

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<PlanParameters> {
    let window: Option<String> = row.get(3)?;
    Ok(PlanParameters {
        version: row.get(0)?,
        frequency_per_week: row.get(1)?,
        min_minutes: row.get(2)?,
        time_window: window.as_deref().map(TimeWindow::parse_lenient),
        minimum_action_text: row.get(4)?,
        recovery_step: row.get(5)?,
        created_at: parse_ts(6, row.get(6)?)?,
    })
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<StoredReport> {
    let source: String = row.get(9)?;
    let findings: Vec<Finding> = parse_json(2, row.get(2)?)?;
    Ok(StoredReport {
        id: row.get(0)?,
        goal_id: row.get(1)?,
        report: MirrorReport {
            findings,
            counterfactual: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            drift_score: row.get(4)?,
            created_at: parse_ts(5, row.get(5)?)?,
            rules_applied: parse_json(6, row.get(6)?)?,
            recurring_blockers: parse_json(7, row.get(7)?)?,
            strength_pattern: row.get(8)?,
            source: if source == "generated" {
                ReportSource::Generated
            } else {
                ReportSource::Deterministic
            },
        },
    })
}
