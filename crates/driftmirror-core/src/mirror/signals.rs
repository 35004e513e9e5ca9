//! Deterministic signals extracted from a single check-in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checkin::{CheckinEvent, Friction};
use crate::error::ValidationError;

/// Signals kept per check-in.
pub const MAX_SIGNALS_PER_CHECKIN: usize = 3;

const BLOCKER_EXCERPT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Gap,
    Blocker,
    Friction,
    Success,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Gap => "gap",
            SignalKind::Blocker => "blocker",
            SignalKind::Friction => "friction",
            SignalKind::Success => "success",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gap" => Ok(SignalKind::Gap),
            "blocker" => Ok(SignalKind::Blocker),
            "friction" => Ok(SignalKind::Friction),
            "success" => Ok(SignalKind::Success),
            other => Err(ValidationError::InvalidValue {
                field: "signal_kind".into(),
                message: format!("unknown signal kind '{other}'"),
            }),
        }
    }
}

/// One observation about a check-in, with a severity in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub content: String,
    pub severity: f64,
}

impl Signal {
    fn new(kind: SignalKind, content: impl Into<String>, severity: f64) -> Self {
        Self {
            kind,
            content: content.into(),
            severity,
        }
    }
}

/// Signals for one check-in, at most [`MAX_SIGNALS_PER_CHECKIN`].
pub fn extract_signals(event: &CheckinEvent) -> Vec<Signal> {
    let mut signals = Vec::new();
    let done = event.did_minimum_action;

    if !done {
        signals.push(Signal::new(SignalKind::Gap, "Minimum action skipped", 0.4));
    }

    if event.has_blocker() {
        let blocker: String = event
            .blocker
            .as_deref()
            .unwrap_or_default()
            .trim()
            .chars()
            .take(BLOCKER_EXCERPT)
            .collect();
        signals.push(Signal::new(
            SignalKind::Blocker,
            format!("Blocked by: {blocker}"),
            0.6,
        ));
    }

    if event.friction == Friction::HIGH {
        signals.push(Signal::new(SignalKind::Friction, "High friction reported", 0.7));
    } else if event.friction == Friction::MEDIUM && !done {
        signals.push(Signal::new(
            SignalKind::Friction,
            "Moderate friction without the minimum action",
            0.5,
        ));
    }

    if done && event.friction == Friction::LOW {
        signals.push(Signal::new(
            SignalKind::Success,
            "Minimum action done with low friction",
            0.2,
        ));
    } else if done {
        signals.push(Signal::new(SignalKind::Success, "Minimum action done", 0.3));
    }

    signals.truncate(MAX_SIGNALS_PER_CHECKIN);
    signals
}
