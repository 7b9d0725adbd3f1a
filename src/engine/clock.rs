// src/engine/clock.rs

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of "now" for the quiz engine.
///
/// Everything time-dependent (the gate, today's quiz date, attempt timestamps,
/// the leaderboard week) reads the clock from `AppState`, so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date of `now` in the operational timezone.
    fn today(&self, timezone: Tz) -> NaiveDate {
        self.now().with_timezone(&timezone).date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_today_follows_timezone() {
        // 23:30 UTC on Jan 31 is already Feb 1 in Paris.
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 31, 23, 30, 0).unwrap());
        assert_eq!(
            clock.today(chrono_tz::Europe::Paris),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
        );
        assert_eq!(
            clock.today(chrono_tz::Africa::Abidjan),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
    }
}
