//! Mirror report trigger.

/// Drift above which a report is warranted.
pub const TRIGGER_DRIFT: f64 = 0.4;
/// History needed before any report is produced.
pub const TRIGGER_MIN_CHECKINS: usize = 3;

/// Both gates must pass: enough drift and enough history.
pub fn should_trigger_report(drift_score: f64, total_checkin_count: usize) -> bool {
    drift_score > TRIGGER_DRIFT && total_checkin_count >= TRIGGER_MIN_CHECKINS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_three_checkins() {
        assert!(!should_trigger_report(1.0, 0));
        assert!(!should_trigger_report(1.0, 2));
        assert!(should_trigger_report(1.0, 3));
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!should_trigger_report(0.4, 10));
        assert!(should_trigger_report(0.41, 10));
    }
}
