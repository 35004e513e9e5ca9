//! The recent check-in window shared by scoring, rules and adjustment.

use crate::checkin::CheckinEvent;

/// Number of check-ins the recent window holds.
pub const RECENT_WINDOW: usize = 5;

/// Newest-first view over at most [`RECENT_WINDOW`] check-ins.
///
/// Events are ordered by timestamp, not by input order, so callers may hand
/// over history in any order.
#[derive(Debug, Clone)]
pub struct RecentWindow<'a> {
    events: Vec<&'a CheckinEvent>,
}

impl<'a> RecentWindow<'a> {
    pub fn from_checkins(checkins: &'a [CheckinEvent]) -> Self {
        Self::with_size(checkins, RECENT_WINDOW)
    }

    pub fn with_size(checkins: &'a [CheckinEvent], size: usize) -> Self {
        let mut events: Vec<&CheckinEvent> = checkins.iter().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(size);
        Self { events }
    }

    pub fn events(&self) -> &[&'a CheckinEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn minimum_action_count(&self) -> usize {
        self.events.iter().filter(|c| c.did_minimum_action).count()
    }

    pub fn missed_count(&self) -> usize {
        self.len() - self.minimum_action_count()
    }

    pub fn blocker_count(&self) -> usize {
        self.events.iter().filter(|c| c.has_blocker()).count()
    }

    /// Share of the window where the minimum action was done; 0.0 when empty.
    pub fn completion_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.minimum_action_count() as f64 / self.len() as f64
    }

    /// Mean friction over the window; 0.0 when empty.
    pub fn avg_friction(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let total: u32 = self.events.iter().map(|c| c.friction.value() as u32).sum();
        total as f64 / self.len() as f64
    }

    /// Share of the window reporting a blocker; 0.0 when empty.
    pub fn blocker_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.blocker_count() as f64 / self.len() as f64
    }

    /// Owned copies of the window, newest first.
    pub fn to_vec(&self) -> Vec<CheckinEvent> {
        self.events.iter().map(|c| (*c).clone()).collect()
    }
}
