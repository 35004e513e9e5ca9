//! Check-in processing and the read views built on top of storage.
//!
//! `submit_checkin` runs the numeric pipeline (signals, drift, rules,
//! trigger, adjustment) inside one `BEGIN IMMEDIATE` transaction. Mirror
//! composition happens after commit, so a slow or failing text generator
//! never holds the write lock or loses a check-in.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::adjust::{
    apply_decision, compute_adjustment, generate_suggestions, AdjustmentDecision,
    AdjustmentSignals, PlanChanges, Suggestion, SuggestionKind,
};
use crate::checkin::{CheckinDraft, CheckinEvent};
use crate::drift::{
    compute_drift_at, explain_rules_at, rule_strings, should_trigger_report, weekly_stats_at,
    RecentWindow,
};
use crate::error::Result;
use crate::goal::Goal;
use crate::metrics::GoalMetrics;
use crate::mirror::generator::MAX_PROMPT_SIGNALS;
use crate::mirror::{
    extract_signals, GeminiClient, GeneratorChain, LlmBackedGenerator, MirrorContext,
    MirrorReport, ProgressSummary, Signal, SummaryContext,
};
use crate::plan::PlanParameters;
use crate::rate_limit::{RateLimiter, SqliteRateLimiter};
use crate::storage::{
    Config, Database, FeedbackSummary, InsightActionKind, StoredCheckin, StoredReport,
};

/// Check-ins shown on the dashboard.
const DASHBOARD_CHECKINS: usize = 5;

/// Result of one check-in submission.
#[derive(Debug, Clone, Serialize)]
pub struct CheckinOutcome {
    pub checkin_id: i64,
    pub signals: Vec<Signal>,
    pub drift_score: f64,
    pub rules_applied: Vec<String>,
    pub drift_triggered: bool,
    /// Present whenever the trigger fired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<AdjustmentDecision>,
    /// The appended plan version, if the adjustment changed a plan field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_plan: Option<PlanParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<MirrorReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub goal: Goal,
    pub plan: PlanParameters,
    pub metrics: GoalMetrics,
    pub recent_checkins: Vec<StoredCheckin>,
    pub latest_report: Option<StoredReport>,
}

/// State committed by the numeric pipeline, handed to report composition.
struct Committed {
    goal: Goal,
    plan: PlanParameters,
    history: Vec<CheckinEvent>,
}

pub struct DriftService {
    db: Database,
    generators: GeneratorChain,
    limiter: Box<dyn RateLimiter>,
}

impl DriftService {
    pub fn new(db: Database, generators: GeneratorChain, limiter: Box<dyn RateLimiter>) -> Self {
        Self {
            db,
            generators,
            limiter,
        }
    }

    /// Open the database at `db_path` and wire generators and the persistent
    /// rate limiter from `config`.
    ///
    /// A missing API key disables the LLM composer with a warning rather
    /// than failing.
    pub fn from_config(db_path: &Path, config: &Config) -> Result<Self> {
        let db = Database::open_at(db_path)?;
        let limiter = SqliteRateLimiter::open(db_path, &config.rate_limit)?;

        let mut generators = GeneratorChain::deterministic();
        if config.llm.enabled {
            match GeminiClient::from_config(&config.llm) {
                Ok(client) => {
                    generators = generators
                        .with(LlmBackedGenerator::new(client, config.llm.max_prompt_chars));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "LLM composer disabled");
                }
            }
        }
        tracing::debug!(generators = ?generators.names(), "drift service ready");

        Ok(Self::new(db, generators, Box::new(limiter)))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Record a check-in and run drift detection on the new history.
    pub fn submit_checkin(&self, goal_id: i64, draft: CheckinDraft) -> Result<CheckinOutcome> {
        self.submit_checkin_at(goal_id, draft, Utc::now())
    }

    pub fn submit_checkin_at(
        &self,
        goal_id: i64,
        draft: CheckinDraft,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome> {
        let event = draft.into_event(now)?;

        let (mut outcome, committed) = self.db.in_transaction(|db| {
            let goal = db.get_goal(goal_id)?;
            let checkin_id = db.record_checkin(goal_id, &event)?;
            let signals = extract_signals(&event);
            db.record_signals(checkin_id, &signals)?;

            let history = db.checkin_events(goal_id, None)?;
            let plan = db.latest_plan(goal_id)?;
            let target = plan.frequency_per_week;

            let drift_score = compute_drift_at(&history, target, now);
            let rules_applied = rule_strings(&explain_rules_at(drift_score, &history, target, now));
            let drift_triggered = should_trigger_report(drift_score, history.len());

            let mut adjustment = None;
            let mut new_plan = None;
            if drift_triggered {
                let inputs = AdjustmentSignals::from_history(drift_score, &history);
                let recent = RecentWindow::from_checkins(&history).to_vec();
                let decision = compute_adjustment(
                    &plan,
                    inputs.drift_score,
                    inputs.avg_friction,
                    inputs.completion_rate,
                    inputs.minimum_action_rate,
                    &recent,
                );
                if let Some(next) = apply_decision(&plan, &decision) {
                    db.append_plan(goal_id, &next)?;
                    new_plan = Some(next);
                }
                adjustment = Some(decision);
            }

            tracing::debug!(goal_id, checkin_id, drift_score, drift_triggered, "check-in processed");

            let outcome = CheckinOutcome {
                checkin_id,
                signals,
                drift_score,
                rules_applied,
                drift_triggered,
                adjustment,
                new_plan: new_plan.clone(),
                report_id: None,
                report: None,
            };
            let committed = Committed {
                goal,
                plan: new_plan.unwrap_or(plan),
                history,
            };
            Ok((outcome, committed))
        })?;

        if outcome.drift_triggered {
            let ctx = MirrorContext {
                goal_title: committed.goal.title,
                goal_why: committed.goal.why,
                plan: committed.plan,
                signals: self.db.recent_signals(goal_id, Some(MAX_PROMPT_SIGNALS))?,
                drift_score: outcome.drift_score,
                rules_applied: outcome.rules_applied.clone(),
                checkins: committed.history,
            };
            let report = self.compose_report(goal_id, &ctx);
            outcome.report_id = Some(self.db.save_report(goal_id, &report)?);
            outcome.report = Some(report);
        }

        Ok(outcome)
    }

    fn compose_report(&self, goal_id: i64, ctx: &MirrorContext) -> MirrorReport {
        if self.text_generation_allowed(goal_id) {
            self.generators.compose(ctx)
        } else {
            self.generators.compose_deterministic(ctx)
        }
    }

    /// Text generators are consulted only while the rate limiter allows it.
    /// Reports and summaries share one budget per goal.
    fn text_generation_allowed(&self, goal_id: i64) -> bool {
        if !self.generators.has_text_generators() {
            return false;
        }
        match self.limiter.check_and_increment(&format!("mirror:goal:{goal_id}")) {
            Ok(decision) if decision.allowed => true,
            Ok(decision) => {
                tracing::warn!(
                    goal_id,
                    retry_after_secs = decision.retry_after.map(|d| d.as_secs()),
                    "text generation rate limited"
                );
                false
            }
            Err(e) => {
                tracing::warn!(goal_id, error = %e, "rate limiter unavailable");
                false
            }
        }
    }

    pub fn progress_summary(&self, goal_id: i64) -> Result<ProgressSummary> {
        self.progress_summary_at(goal_id, Utc::now())
    }

    /// Look back over the whole history of a goal. Nothing is written.
    pub fn progress_summary_at(&self, goal_id: i64, now: DateTime<Utc>) -> Result<ProgressSummary> {
        let goal = self.db.get_goal(goal_id)?;
        let history = self.db.checkin_events(goal_id, None)?;
        let ctx = SummaryContext::from_history(goal.title, goal.why, goal.created_at, &history, now);
        if !ctx.notes.is_empty() && self.text_generation_allowed(goal_id) {
            Ok(self.generators.summarize(&ctx))
        } else {
            Ok(self.generators.summarize_deterministic(&ctx))
        }
    }

    pub fn dashboard(&self, goal_id: i64) -> Result<Dashboard> {
        self.dashboard_at(goal_id, Utc::now())
    }

    pub fn dashboard_at(&self, goal_id: i64, now: DateTime<Utc>) -> Result<Dashboard> {
        let goal = self.db.get_goal(goal_id)?;
        let plan = self.db.latest_plan(goal_id)?;
        let checkins = self.db.checkins(goal_id, None)?;
        let history: Vec<CheckinEvent> = checkins.iter().map(|c| c.event.clone()).collect();
        let metrics = GoalMetrics::compute_at(&history, plan.frequency_per_week, now);

        Ok(Dashboard {
            goal,
            plan,
            metrics,
            recent_checkins: checkins.into_iter().take(DASHBOARD_CHECKINS).collect(),
            latest_report: self.db.latest_report(goal_id)?,
        })
    }

    pub fn suggestions(&self, goal_id: i64) -> Result<Vec<Suggestion>> {
        self.suggestions_at(goal_id, Utc::now())
    }

    /// Read-only: nothing is written until a suggestion is accepted.
    pub fn suggestions_at(&self, goal_id: i64, now: DateTime<Utc>) -> Result<Vec<Suggestion>> {
        self.db.get_goal(goal_id)?;
        let plan = self.db.latest_plan(goal_id)?;
        let history = self.db.checkin_events(goal_id, None)?;
        let drift_score = compute_drift_at(&history, plan.frequency_per_week, now);
        let weekly = weekly_stats_at(&history, plan.frequency_per_week, now);
        Ok(generate_suggestions(&history, &plan, drift_score, &weekly))
    }

    /// Validate an untyped change map and apply it as a new plan version.
    ///
    /// Returns the plan in force afterwards. A map carrying only
    /// `simplify_minimum_action` records the acceptance without a new
    /// version.
    pub fn accept_suggestion(
        &self,
        goal_id: i64,
        changes: &Map<String, Value>,
        kind: SuggestionKind,
    ) -> Result<PlanParameters> {
        let changes = PlanChanges::from_untyped(changes)?;
        self.db.in_transaction(|db| {
            db.get_goal(goal_id)?;
            let current = db.latest_plan(goal_id)?;
            let plan = if changes.has_parameter_changes() {
                let next = current.next_version(&changes, format!("Accepted suggestion: {kind}"));
                db.append_plan(goal_id, &next)?;
                next
            } else {
                current
            };
            let report_id = db.latest_report(goal_id)?.map(|r| r.id);
            db.record_insight_action(goal_id, kind, InsightActionKind::Accepted, &changes, report_id)?;
            Ok(plan)
        })
    }

    pub fn dismiss_suggestion(&self, goal_id: i64, kind: SuggestionKind) -> Result<i64> {
        self.db.get_goal(goal_id)?;
        let report_id = self.db.latest_report(goal_id)?.map(|r| r.id);
        self.db.record_insight_action(
            goal_id,
            kind,
            InsightActionKind::Dismissed,
            &PlanChanges::default(),
            report_id,
        )
    }

    pub fn record_feedback(&self, report_id: i64, helpful: bool) -> Result<FeedbackSummary> {
        self.db.record_feedback(report_id, helpful)?;
        self.db.feedback_summary(report_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, GeneratorError};
    use crate::goal::NewGoal;
    use crate::mirror::{MirrorGenerator, ReportSource};
    use crate::rate_limit::InMemoryRateLimiter;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    /// Always succeeds with a fixed finding.
    struct Scripted;

    impl MirrorGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn compose(&self, ctx: &MirrorContext) -> std::result::Result<MirrorReport, GeneratorError> {
            let mut report = crate::mirror::compose_deterministic(ctx);
            report.source = ReportSource::Generated;
            Ok(report)
        }
    }

    // Wednesday morning
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap()
    }

    fn hard_session() -> CheckinDraft {
        CheckinDraft {
            did_minimum_action: true,
            friction: 3,
            ..Default::default()
        }
    }

    fn blocked_session() -> CheckinDraft {
        CheckinDraft {
            blocker: Some("late meetings".into()),
            ..hard_session()
        }
    }

    fn service(generators: GeneratorChain, limit: u32) -> (DriftService, i64) {
        let db = Database::open_memory().unwrap();
        let (goal, _) = db.create_goal(&NewGoal::new("Run", 7, 20)).unwrap();
        let limiter = InMemoryRateLimiter::new(limit, StdDuration::from_secs(3600));
        (DriftService::new(db, generators, Box::new(limiter)), goal.id)
    }

    #[test]
    fn early_checkins_do_not_trigger() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        let outcome = svc.submit_checkin_at(goal_id, hard_session(), t0()).unwrap();
        assert!(!outcome.drift_triggered);
        assert!(outcome.adjustment.is_none());
        assert!(outcome.report.is_none());
        assert_eq!(outcome.signals.len(), 2);
    }

    #[test]
    fn high_friction_shortens_sessions_and_writes_report() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        let mut last = None;
        for i in 0..3 {
            last = Some(
                svc.submit_checkin_at(goal_id, hard_session(), t0() + Duration::hours(i))
                    .unwrap(),
            );
        }
        let outcome = last.unwrap();
        assert!(outcome.drift_triggered);
        assert_eq!(outcome.new_plan.as_ref().map(|p| p.min_minutes), Some(15));
        assert_eq!(svc.db().latest_plan(goal_id).unwrap().version, 2);

        let report = outcome.report.unwrap();
        assert_eq!(report.source, ReportSource::Deterministic);
        let stored = svc.db().latest_report(goal_id).unwrap().unwrap();
        assert_eq!(Some(stored.id), outcome.report_id);
    }

    #[test]
    fn submitted_checkin_counts_toward_weekly_target() {
        let (svc, _) = service(GeneratorChain::deterministic(), 5);
        let (goal, _) = svc.db().create_goal(&NewGoal::new("Stretch", 3, 20)).unwrap();
        let drafts = [hard_session(), blocked_session(), blocked_session()];
        let mut last = None;
        for (i, draft) in drafts.into_iter().enumerate() {
            last = Some(
                svc.submit_checkin_at(goal.id, draft, t0() + Duration::hours(i as i64))
                    .unwrap(),
            );
        }
        let outcome = last.unwrap();

        // 3 of 3 sessions done: only friction (0.20) and blockers (0.10) remain
        assert!((outcome.drift_score - 0.30).abs() < 1e-9);
        assert!(!outcome.drift_triggered);
        assert!(outcome.new_plan.is_none());
        assert!(outcome.report.is_none());
        assert_eq!(svc.db().latest_plan(goal.id).unwrap().version, 1);
    }

    #[test]
    fn rate_limit_falls_back_to_deterministic() {
        let chain = GeneratorChain::deterministic().with(Scripted);
        let (svc, goal_id) = service(chain, 1);
        let sources: Vec<_> = (0..4)
            .filter_map(|i| {
                svc.submit_checkin_at(goal_id, blocked_session(), t0() + Duration::hours(i))
                    .unwrap()
                    .report
            })
            .map(|r| r.source)
            .collect();
        assert_eq!(
            sources,
            vec![ReportSource::Generated, ReportSource::Deterministic]
        );
    }

    #[test]
    fn invalid_draft_writes_nothing() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        let draft = CheckinDraft {
            friction: 7,
            ..Default::default()
        };
        assert!(matches!(
            svc.submit_checkin_at(goal_id, draft, t0()),
            Err(CoreError::Validation(_))
        ));
        assert!(svc.db().checkin_events(goal_id, None).unwrap().is_empty());
    }

    #[test]
    fn unknown_goal_is_not_found() {
        let (svc, _) = service(GeneratorChain::deterministic(), 5);
        assert!(matches!(
            svc.submit_checkin_at(99, hard_session(), t0()),
            Err(CoreError::NotFound { entity: "goal", .. })
        ));
    }

    #[test]
    fn accept_applies_validated_changes() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        let changes: Map<String, Value> =
            serde_json::from_str(r#"{"frequency_per_week": 5}"#).unwrap();
        let plan = svc
            .accept_suggestion(goal_id, &changes, SuggestionKind::ReduceFrequency)
            .unwrap();
        assert_eq!(plan.version, 2);
        assert_eq!(plan.frequency_per_week, 5);
        assert_eq!(plan.min_minutes, 20);

        let actions = svc.db().insight_actions(goal_id).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, InsightActionKind::Accepted);
    }

    #[test]
    fn accept_rejects_out_of_range_changes() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        let changes: Map<String, Value> =
            serde_json::from_str(r#"{"min_minutes": 9999}"#).unwrap();
        assert!(svc
            .accept_suggestion(goal_id, &changes, SuggestionKind::ReduceDuration)
            .is_err());
        assert_eq!(svc.db().latest_plan(goal_id).unwrap().version, 1);
        assert!(svc.db().insight_actions(goal_id).unwrap().is_empty());
    }

    #[test]
    fn dismiss_records_action_without_new_plan() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        svc.dismiss_suggestion(goal_id, SuggestionKind::RecoveryMode)
            .unwrap();
        assert_eq!(svc.db().latest_plan(goal_id).unwrap().version, 1);
        assert_eq!(
            svc.db().insight_actions(goal_id).unwrap()[0].action,
            InsightActionKind::Dismissed
        );
    }

    #[test]
    fn progress_summary_counts_whole_history() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        let noted = CheckinDraft {
            did_minimum_action: true,
            friction: 1,
            extra_done: Some("added a stretch".into()),
            ..Default::default()
        };
        for i in 0..4 {
            svc.submit_checkin_at(goal_id, noted.clone(), t0() + Duration::hours(i))
                .unwrap();
        }
        let created = svc.db().get_goal(goal_id).unwrap().created_at;
        let summary = svc
            .progress_summary_at(goal_id, created + Duration::days(30))
            .unwrap();
        assert_eq!(summary.days_to_habit, 60);
        assert_eq!(summary.source, ReportSource::Deterministic);
        assert!(summary.overall_progress.contains("4 check-ins"));

        assert!(matches!(
            svc.progress_summary_at(99, t0()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn progress_summary_uses_text_generator_once_allowed() {
        struct Summarizer;

        impl MirrorGenerator for Summarizer {
            fn name(&self) -> &str {
                "summarizer"
            }

            fn compose(
                &self,
                ctx: &MirrorContext,
            ) -> std::result::Result<MirrorReport, GeneratorError> {
                Ok(crate::mirror::compose_deterministic(ctx))
            }

            fn summarize(
                &self,
                ctx: &SummaryContext,
            ) -> std::result::Result<ProgressSummary, GeneratorError> {
                let mut summary = crate::mirror::compose_summary_deterministic(ctx);
                summary.source = ReportSource::Generated;
                Ok(summary)
            }
        }

        let (svc, goal_id) = service(GeneratorChain::deterministic().with(Summarizer), 1);
        let noted = CheckinDraft {
            did_minimum_action: true,
            friction: 1,
            extra_done: Some("read two chapters".into()),
            ..Default::default()
        };
        svc.submit_checkin_at(goal_id, noted, t0()).unwrap();

        let first = svc.progress_summary_at(goal_id, t0()).unwrap();
        let second = svc.progress_summary_at(goal_id, t0()).unwrap();
        assert_eq!(first.source, ReportSource::Generated);
        assert_eq!(second.source, ReportSource::Deterministic);
    }

    #[test]
    fn dashboard_reflects_history() {
        let (svc, goal_id) = service(GeneratorChain::deterministic(), 5);
        for i in 0..7 {
            svc.submit_checkin_at(goal_id, hard_session(), t0() + Duration::hours(i))
                .unwrap();
        }
        let dashboard = svc.dashboard_at(goal_id, t0() + Duration::hours(8)).unwrap();
        assert_eq!(dashboard.metrics.total_checkins, 7);
        assert_eq!(dashboard.recent_checkins.len(), 5);
        assert!(dashboard.latest_report.is_some());
        assert!(dashboard.plan.version > 1);
    }
}
