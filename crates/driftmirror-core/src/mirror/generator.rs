//! Composer strategies and the fallback chain.

use std::fmt::Write as _;

use chrono::Utc;
use serde_json::Value;

use super::json::extract_json_object;
use super::report::{
    compose_deterministic, counterfactual_for, recurring_blockers, strength_pattern, Finding,
    MirrorReport, ReportSource,
};
use super::summary::{
    build_summary_prompt, compose_summary_deterministic, parse_summary, ProgressSummary,
    SummaryContext, SUMMARY_SYSTEM,
};
use super::MirrorContext;
use crate::error::GeneratorError;

/// Signals included in a prompt.
pub const MAX_PROMPT_SIGNALS: usize = 9;

pub const TRUNCATION_MARKER: &str = "\n\n[...truncated for context limit...]\n\n";

const TRUNCATION_BUFFER: usize = 100;
const MIN_PROMPT_CHARS: usize = 500;

pub const MIRROR_SYSTEM: &str = "You are a reflection agent. Create insightful, non-judgmental \
     mirror reports. Output ONLY valid JSON with no extra text.";

/// Free-text generation capability: prompt plus system instruction in,
/// text out.
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str, system: &str) -> Result<String, GeneratorError>;
}

/// A way of composing a mirror report.
pub trait MirrorGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn compose(&self, ctx: &MirrorContext) -> Result<MirrorReport, GeneratorError>;

    /// Progress summaries are optional for a composer.
    fn summarize(&self, _ctx: &SummaryContext) -> Result<ProgressSummary, GeneratorError> {
        Err(GeneratorError::NotConfigured(format!(
            "{} (progress summaries)",
            self.name()
        )))
    }
}

/// Composes from signals alone. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicGenerator;

impl MirrorGenerator for DeterministicGenerator {
    fn name(&self) -> &str {
        "deterministic"
    }

    fn compose(&self, ctx: &MirrorContext) -> Result<MirrorReport, GeneratorError> {
        Ok(compose_deterministic(ctx))
    }

    fn summarize(&self, ctx: &SummaryContext) -> Result<ProgressSummary, GeneratorError> {
        Ok(compose_summary_deterministic(ctx))
    }
}

/// Composes by prompting a [`TextGenerator`] and parsing its JSON answer.
pub struct LlmBackedGenerator<T> {
    text: T,
    max_prompt_chars: usize,
}

impl<T: TextGenerator> LlmBackedGenerator<T> {
    pub fn new(text: T, max_prompt_chars: usize) -> Self {
        Self {
            text,
            max_prompt_chars,
        }
    }
}

impl<T: TextGenerator> MirrorGenerator for LlmBackedGenerator<T> {
    fn name(&self) -> &str {
        self.text.name()
    }

    fn compose(&self, ctx: &MirrorContext) -> Result<MirrorReport, GeneratorError> {
        let prompt = truncate_prompt(&build_prompt(ctx), MIRROR_SYSTEM, self.max_prompt_chars);
        let raw = self.text.generate(&prompt, MIRROR_SYSTEM)?;
        if raw.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }

        let map = extract_json_object(&raw)
            .ok_or_else(|| GeneratorError::Unparseable("no JSON object in response".into()))?;
        let findings: Vec<Finding> = map
            .get("findings")
            .cloned()
            .ok_or_else(|| GeneratorError::Unparseable("missing 'findings'".into()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| GeneratorError::Unparseable(e.to_string()))
            })?;
        if findings.is_empty() {
            return Err(GeneratorError::Unparseable("empty 'findings'".into()));
        }

        let text_field = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(MirrorReport {
            findings,
            counterfactual: text_field("counterfactual")
                .unwrap_or_else(|| counterfactual_for(ctx.drift_score).to_string()),
            drift_score: ctx.drift_score,
            rules_applied: ctx.rules_applied.clone(),
            recurring_blockers: recurring_blockers(ctx),
            strength_pattern: text_field("strength_pattern").or_else(|| strength_pattern(ctx)),
            source: ReportSource::Generated,
            created_at: Utc::now(),
        }
        .normalize())
    }

    fn summarize(&self, ctx: &SummaryContext) -> Result<ProgressSummary, GeneratorError> {
        let prompt = truncate_prompt(
            &build_summary_prompt(ctx),
            SUMMARY_SYSTEM,
            self.max_prompt_chars,
        );
        let raw = self.text.generate(&prompt, SUMMARY_SYSTEM)?;
        parse_summary(&raw, ctx)
    }
}

/// Ordered composers ending with the deterministic one.
#[derive(Default)]
pub struct GeneratorChain {
    generators: Vec<Box<dyn MirrorGenerator>>,
    fallback: DeterministicGenerator,
}

impl GeneratorChain {
    /// A chain holding only the deterministic composer.
    pub fn deterministic() -> Self {
        Self::default()
    }

    /// Append a composer, tried before the deterministic fallback.
    pub fn with(mut self, generator: impl MirrorGenerator + 'static) -> Self {
        self.generators.push(Box::new(generator));
        self
    }

    /// False for a chain that can only compose deterministically.
    pub fn has_text_generators(&self) -> bool {
        !self.generators.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.generators
            .iter()
            .map(|g| g.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// Try each composer in order; the first success wins.
    pub fn compose(&self, ctx: &MirrorContext) -> MirrorReport {
        for generator in &self.generators {
            match generator.compose(ctx) {
                Ok(report) => {
                    tracing::info!(generator = generator.name(), "mirror report composed");
                    return report;
                }
                Err(e) => {
                    tracing::warn!(
                        generator = generator.name(),
                        error = %e,
                        "mirror generator failed, falling back"
                    );
                }
            }
        }
        self.compose_deterministic(ctx)
    }

    /// Skip every text generator.
    pub fn compose_deterministic(&self, ctx: &MirrorContext) -> MirrorReport {
        tracing::info!(generator = self.fallback.name(), "mirror report composed");
        compose_deterministic(ctx)
    }

    /// Try each composer for a progress summary; the first success wins.
    ///
    /// Without notes there is nothing for a text generator to read, so the
    /// deterministic summary is used directly.
    pub fn summarize(&self, ctx: &SummaryContext) -> ProgressSummary {
        if ctx.notes.is_empty() {
            return self.summarize_deterministic(ctx);
        }
        for generator in &self.generators {
            match generator.summarize(ctx) {
                Ok(summary) => {
                    tracing::info!(generator = generator.name(), "progress summary composed");
                    return summary;
                }
                Err(e) => {
                    tracing::warn!(
                        generator = generator.name(),
                        error = %e,
                        "summary generator failed, falling back"
                    );
                }
            }
        }
        self.summarize_deterministic(ctx)
    }

    pub fn summarize_deterministic(&self, ctx: &SummaryContext) -> ProgressSummary {
        tracing::info!(generator = self.fallback.name(), "progress summary composed");
        compose_summary_deterministic(ctx)
    }
}

/// Prompt text for a mirror report.
pub fn build_prompt(ctx: &MirrorContext) -> String {
    let plan = &ctx.plan;
    let window = plan.time_window.map_or("any time", |w| w.as_str());

    let mut prompt = String::from(
        "Create a mirror report based on these signals from recent check-ins:\n\n",
    );
    let _ = writeln!(prompt, "Goal: {}", ctx.goal_title);
    let _ = writeln!(prompt, "Goal Why: {}", ctx.goal_why.as_deref().unwrap_or("not stated"));
    let _ = writeln!(
        prompt,
        "Current Plan: {}/week, {} min, {}",
        plan.frequency_per_week, plan.min_minutes, window
    );
    if let Some(action) = &plan.minimum_action_text {
        let _ = writeln!(prompt, "Minimum Action: {action}");
    }

    prompt.push_str("\nRecent Signals:\n");
    if ctx.signals.is_empty() {
        prompt.push_str("- none recorded\n");
    }
    for signal in ctx.signals.iter().take(MAX_PROMPT_SIGNALS) {
        let _ = writeln!(
            prompt,
            "- [{}] {} (severity {:.1})",
            signal.kind, signal.content, signal.severity
        );
    }

    let _ = writeln!(
        prompt,
        "\nDrift Score: {:.2} (0=on track, 1=significant drift)",
        ctx.drift_score
    );
    if !ctx.rules_applied.is_empty() {
        let _ = writeln!(prompt, "Rules Fired: {}", ctx.rules_applied.join(", "));
    }

    prompt.push_str(
        r#"
Create a mirror report in this exact JSON format:
{
  "findings": [
    {
      "finding": "observation in neutral tone",
      "evidence": ["quote or data point 1", "quote or data point 2"],
      "order": 1,
      "root_cause_hypothesis": "optional, why this pattern may exist"
    }
  ],
  "counterfactual": "Based on your pattern, you likely could have [specific achievable outcome] if [small change]. This was within reach.",
  "strength_pattern": "optional, what is working well"
}

Rules:
- Max 3 findings
- order: 1=first-order (direct observation), 2=second-order (pattern/implication)
- Neutral, supportive tone
- Counterfactual should be specific and quantified if possible
- Use "based on" and "likely" phrasing

Output only the JSON."#,
    );
    prompt
}

/// Fit `prompt` into `max_chars` alongside `system`.
///
/// When it does not fit, keep the first 60% and last 40% of the space left
/// after the system text and a 100-character buffer (never less than 500
/// characters), joined by [`TRUNCATION_MARKER`]. Counts are in characters.
pub fn truncate_prompt(prompt: &str, system: &str, max_chars: usize) -> String {
    let prompt_len = prompt.chars().count();
    let system_len = system.chars().count();
    if prompt_len + system_len <= max_chars {
        return prompt.to_string();
    }

    let available = max_chars
        .saturating_sub(system_len)
        .saturating_sub(TRUNCATION_BUFFER)
        .max(MIN_PROMPT_CHARS);
    if prompt_len <= available {
        return prompt.to_string();
    }

    let head_len = available * 6 / 10;
    let tail_len = available - head_len;
    let head: String = prompt.chars().take(head_len).collect();
    let tail: String = prompt.chars().skip(prompt_len - tail_len).collect();
    tracing::debug!(prompt_len, available, "prompt truncated");
    format!("{head}{TRUNCATION_MARKER}{tail}")
}
