// src/engine/gate.rs

use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::{config::QuizSettings, error::AppError};

/// A wall-clock time of day at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowTime {
    pub hour: u32,
    pub minute: u32,
}

impl WindowTime {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

impl fmt::Display for WindowTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Whether participation is allowed at `now`.
///
/// Open iff the local time in `timezone` is at or after `open` and at or
/// before `close`, both inclusive at minute resolution. A window whose close
/// precedes its open never opens.
pub fn is_open(now: DateTime<Utc>, timezone: Tz, open: WindowTime, close: WindowTime) -> bool {
    let local = now.with_timezone(&timezone);
    let current = WindowTime::new(local.hour(), local.minute());
    current >= open && current <= close
}

/// Fails fast with `GateClosed` outside the configured window.
pub fn ensure_open(now: DateTime<Utc>, settings: &QuizSettings) -> Result<(), AppError> {
    if is_open(now, settings.timezone, settings.open_time, settings.close_time) {
        return Ok(());
    }

    tracing::debug!(%now, "Quiz gate closed");
    Err(AppError::GateClosed {
        open_time: settings.open_time.to_string(),
        close_time: settings.close_time.to_string(),
        timezone: settings.timezone.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::{Africa::Abidjan, Europe::Paris};

    const OPEN: WindowTime = WindowTime::new(20, 0);
    const CLOSE: WindowTime = WindowTime::new(23, 59);

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        // Abidjan is UTC+0 all year.
        Utc.with_ymd_and_hms(2026, 2, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_closed_one_minute_before_opening() {
        assert!(!is_open(at(19, 59, 59), Abidjan, OPEN, CLOSE));
    }

    #[test]
    fn test_open_at_opening_and_closing_minute() {
        assert!(is_open(at(20, 0, 0), Abidjan, OPEN, CLOSE));
        assert!(is_open(at(21, 30, 0), Abidjan, OPEN, CLOSE));
        assert!(is_open(at(23, 59, 0), Abidjan, OPEN, CLOSE));
        assert!(is_open(at(23, 59, 59), Abidjan, OPEN, CLOSE));
    }

    #[test]
    fn test_closed_at_midnight() {
        assert!(!is_open(at(0, 0, 0), Abidjan, OPEN, CLOSE));
    }

    #[test]
    fn test_close_minute_is_respected() {
        let close = WindowTime::new(22, 30);
        assert!(is_open(at(22, 30, 0), Abidjan, OPEN, close));
        assert!(!is_open(at(22, 31, 0), Abidjan, OPEN, close));
    }

    #[test]
    fn test_uses_local_time_of_timezone() {
        // 19:30 UTC in summer is 21:30 in Paris.
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 19, 30, 0).unwrap();
        assert!(is_open(now, Paris, OPEN, CLOSE));
        assert!(!is_open(now, Abidjan, OPEN, CLOSE));
    }

    #[test]
    fn test_ensure_open_carries_bounds() {
        let settings = QuizSettings::default();
        match ensure_open(at(12, 0, 0), &settings) {
            Err(AppError::GateClosed {
                open_time,
                close_time,
                timezone,
            }) => {
                assert_eq!(open_time, "20:00");
                assert_eq!(close_time, "23:59");
                assert_eq!(timezone, "Africa/Abidjan");
            }
            other => panic!("expected GateClosed, got {:?}", other),
        }
        assert!(ensure_open(at(20, 15, 0), &settings).is_ok());
    }
}
