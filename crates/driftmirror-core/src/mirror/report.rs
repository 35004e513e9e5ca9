//! Mirror reports and the deterministic composer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signals::SignalKind;
use super::MirrorContext;

/// Findings kept per report.
pub const MAX_FINDINGS: usize = 3;

const COUNTERFACTUAL_DEFAULT: &str = "Based on your pattern, you likely could have completed one \
     more session this week with sessions 5 minutes shorter. That step was within reach.";
const COUNTERFACTUAL_HIGH_DRIFT: &str = "Based on your friction levels, you likely could have kept \
     momentum with shorter, more frequent sessions. Ten minutes done consistently beats thirty \
     minutes skipped.";

/// Which composer produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    Generated,
    Deterministic,
}

impl ReportSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportSource::Generated => "generated",
            ReportSource::Deterministic => "deterministic",
        }
    }
}

/// One observation in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub finding: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// 1 = direct observation, 2 = pattern or implication
    #[serde(default = "first_order")]
    pub order: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause_hypothesis: Option<String>,
}

fn first_order() -> u8 {
    1
}

impl Finding {
    fn new(finding: impl Into<String>, evidence: Vec<String>, order: u8) -> Self {
        Self {
            finding: finding.into(),
            evidence,
            order,
            root_cause_hypothesis: None,
        }
    }
}

/// Qualitative diagnostic of recent check-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorReport {
    pub findings: Vec<Finding>,
    pub counterfactual: String,
    pub drift_score: f64,
    pub rules_applied: Vec<String>,
    /// Blockers mentioned two or more times in the loaded history
    pub recurring_blockers: Vec<String>,
    pub strength_pattern: Option<String>,
    pub source: ReportSource,
    pub created_at: DateTime<Utc>,
}

impl MirrorReport {
    /// Keep at most [`MAX_FINDINGS`] findings and force `order` into 1..=2.
    pub(crate) fn normalize(mut self) -> Self {
        self.findings.truncate(MAX_FINDINGS);
        for finding in &mut self.findings {
            finding.order = finding.order.clamp(1, 2);
        }
        self
    }
}

/// Counterfactual sentence for a drift level.
pub fn counterfactual_for(drift_score: f64) -> &'static str {
    if drift_score > 0.6 {
        COUNTERFACTUAL_HIGH_DRIFT
    } else {
        COUNTERFACTUAL_DEFAULT
    }
}

/// Compose a report from signals alone.
pub fn compose_deterministic(ctx: &MirrorContext) -> MirrorReport {
    let evidence_for = |kind: SignalKind| -> Vec<String> {
        ctx.signals
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.content.clone())
            .take(2)
            .collect()
    };
    let has = |kind: SignalKind| ctx.signals.iter().any(|s| s.kind == kind);

    let mut findings = Vec::new();
    if has(SignalKind::Blocker) {
        findings.push(Finding::new(
            "External obstacles are appearing in your path",
            evidence_for(SignalKind::Blocker),
            1,
        ));
    }
    if has(SignalKind::Friction) {
        findings.push(Finding::new(
            "Some internal resistance is showing up",
            evidence_for(SignalKind::Friction),
            1,
        ));
    }
    if has(SignalKind::Gap) {
        findings.push(Finding::new(
            "The plan and what actually happened are drifting apart, a pattern worth noticing",
            evidence_for(SignalKind::Gap),
            2,
        ));
    }
    if findings.is_empty() {
        let mut evidence: Vec<String> =
            ctx.signals.iter().take(2).map(|s| s.content.clone()).collect();
        if evidence.is_empty() {
            evidence.push("Limited data available".to_string());
        }
        findings.push(Finding::new("Your recent activity shows mixed signals", evidence, 1));
    }

    MirrorReport {
        findings,
        counterfactual: counterfactual_for(ctx.drift_score).to_string(),
        drift_score: ctx.drift_score,
        rules_applied: ctx.rules_applied.clone(),
        recurring_blockers: recurring_blockers(ctx),
        strength_pattern: strength_pattern(ctx),
        source: ReportSource::Deterministic,
        created_at: Utc::now(),
    }
    .normalize()
}

/// Blockers mentioned at least twice, compared case-insensitively, most
/// frequent first. The first spelling seen is kept.
pub fn recurring_blockers(ctx: &MirrorContext) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize, String)> = HashMap::new();
    for (idx, event) in ctx.checkins.iter().enumerate() {
        if !event.has_blocker() {
            continue;
        }
        let Some(raw) = event.blocker.as_deref() else {
            continue;
        };
        let text = raw.trim();
        let entry = counts
            .entry(text.to_lowercase())
            .or_insert_with(|| (0, idx, text.to_string()));
        entry.0 += 1;
    }

    let mut recurring: Vec<(usize, usize, String)> =
        counts.into_values().filter(|(n, _, _)| *n >= 2).collect();
    recurring.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    recurring.into_iter().map(|(_, _, text)| text).collect()
}

/// A sentence about what is working, if anything is.
pub fn strength_pattern(ctx: &MirrorContext) -> Option<String> {
    let successes = ctx
        .signals
        .iter()
        .filter(|s| s.kind == SignalKind::Success)
        .count();
    if successes == 0 {
        return None;
    }
    let extras = ctx
        .checkins
        .iter()
        .filter(|c| c.did_minimum_action && c.extra_done.as_deref().is_some_and(|e| !e.trim().is_empty()))
        .count();
    Some(if extras > 0 {
        format!(
            "The minimum action shows up in {successes} recent signals, and {extras} of those days went beyond it."
        )
    } else {
        format!("The minimum action shows up in {successes} recent signals. That foundation is holding.")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::{CheckinEvent, Friction};
    use crate::mirror::signals::extract_signals;
    use crate::plan::PlanParameters;

    fn ctx(checkins: Vec<CheckinEvent>, drift_score: f64) -> MirrorContext {
        let signals = checkins.iter().flat_map(extract_signals).collect();
        MirrorContext {
            goal_title: "Meditate".into(),
            goal_why: None,
            plan: PlanParameters::initial(3, 15, None, None).unwrap(),
            signals,
            drift_score,
            rules_applied: vec!["moderate_drift".into()],
            checkins,
        }
    }

    #[test]
    fn findings_follow_signal_kinds() {
        let report = compose_deterministic(&ctx(
            vec![CheckinEvent::new(Utc::now(), false, Friction::HIGH).with_blocker("travel")],
            0.5,
        ));
        let orders: Vec<_> = report.findings.iter().map(|f| f.order).collect();
        assert_eq!(orders, vec![1, 1, 2]);
        assert_eq!(report.findings[0].evidence, vec!["Blocked by: travel"]);
        assert_eq!(report.source, ReportSource::Deterministic);
        assert_eq!(report.counterfactual, COUNTERFACTUAL_DEFAULT);
        assert_eq!(report.rules_applied, vec!["moderate_drift"]);
    }

    #[test]
    fn only_successes_yield_mixed_signals() {
        let report = compose_deterministic(&ctx(
            vec![CheckinEvent::new(Utc::now(), true, Friction::LOW)],
            0.7,
        ));
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].finding, "Your recent activity shows mixed signals");
        assert_eq!(report.counterfactual, COUNTERFACTUAL_HIGH_DRIFT);
        assert!(report.strength_pattern.is_some());
    }

    #[test]
    fn empty_context_has_placeholder_evidence() {
        let report = compose_deterministic(&ctx(Vec::new(), 0.0));
        assert_eq!(report.findings[0].evidence, vec!["Limited data available"]);
        assert!(report.strength_pattern.is_none());
        assert!(report.recurring_blockers.is_empty());
    }

    #[test]
    fn recurring_blockers_need_two_mentions() {
        let now = Utc::now();
        let report = compose_deterministic(&ctx(
            vec![
                CheckinEvent::new(now, false, Friction::MEDIUM).with_blocker("Late meetings"),
                CheckinEvent::new(now, false, Friction::MEDIUM).with_blocker("late meetings "),
                CheckinEvent::new(now, false, Friction::MEDIUM).with_blocker("sick"),
            ],
            0.5,
        ));
        assert_eq!(report.recurring_blockers, vec!["Late meetings"]);
    }

    #[test]
    fn normalize_caps_and_clamps() {
        let finding = |order| Finding::new("x", Vec::new(), order);
        let report = MirrorReport {
            findings: vec![finding(0), finding(7), finding(2), finding(1)],
            counterfactual: String::new(),
            drift_score: 0.5,
            rules_applied: Vec::new(),
            recurring_blockers: Vec::new(),
            strength_pattern: None,
            source: ReportSource::Generated,
            created_at: Utc::now(),
        }
        .normalize();
        let orders: Vec<_> = report.findings.iter().map(|f| f.order).collect();
        assert_eq!(orders, vec![1, 2, 2]);
    }
}
