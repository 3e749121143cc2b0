use chrono::{DateTime, Utc};

/// Module countdown anchored at the moment the module became active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    started_at: DateTime<Utc>,
    duration_secs: u32,
}

impl Countdown {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, duration_secs: u32) -> Self {
        Self {
            started_at,
            duration_secs,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Whole seconds left at `now`; never negative.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = (now - self.started_at).num_seconds().max(0);
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        self.duration_secs.saturating_sub(elapsed)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) == 0
    }
}

/// Format seconds as `MM:SS` (minutes are not wrapped at 60).
#[must_use]
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn counts_down_and_expires() {
        let start = fixed_now();
        let countdown = Countdown::new(start, 120);

        assert_eq!(countdown.remaining_secs(start), 120);
        assert_eq!(countdown.remaining_secs(start + Duration::seconds(45)), 75);
        assert!(!countdown.is_expired(start + Duration::seconds(119)));
        assert!(countdown.is_expired(start + Duration::seconds(120)));
        assert_eq!(countdown.remaining_secs(start + Duration::hours(3)), 0);
    }

    #[test]
    fn clock_before_start_reports_full_duration() {
        let start = fixed_now();
        let countdown = Countdown::new(start, 60);
        assert_eq!(countdown.remaining_secs(start - Duration::seconds(10)), 60);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(75), "01:15");
        assert_eq!(format_clock(35 * 60), "35:00");
        assert_eq!(format_clock(100 * 60 + 5), "100:05");
    }
}
