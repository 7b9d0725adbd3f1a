// src/config.rs

use std::env;
use std::sync::LazyLock;

use chrono_tz::Tz;
use dotenvy::dotenv;
use regex::Regex;

use crate::engine::gate::WindowTime;

/// Number of questions in every daily quiz unless overridden.
pub const DEFAULT_QUESTION_COUNT: i64 = 20;

/// Seconds a participant gets per question (display only, the client runs the timer).
pub const DEFAULT_TIME_PER_QUESTION: i64 = 10;

pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;

static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid time regex"));

/// Operational settings of the daily quiz.
#[derive(Debug, Clone)]
pub struct QuizSettings {
    /// Timezone in which "today", the nightly window and the ISO week are evaluated.
    pub timezone: Tz,
    pub open_time: WindowTime,
    pub close_time: WindowTime,
    pub question_count: i64,
    pub time_per_question: i64,
    pub leaderboard_limit: i64,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Africa::Abidjan,
            open_time: WindowTime::new(20, 0),
            close_time: WindowTime::new(23, 59),
            question_count: DEFAULT_QUESTION_COUNT,
            time_per_question: DEFAULT_TIME_PER_QUESTION,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub cors_origin: String,
    pub quiz: QuizSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origin =
            env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            cors_origin,
            quiz: QuizSettings::from_env(),
        }
    }
}

impl QuizSettings {
    fn from_env() -> Self {
        let defaults = Self::default();

        let timezone = match env::var("QUIZ_TIMEZONE") {
            Ok(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!("Unknown QUIZ_TIMEZONE '{}', using {}", name, defaults.timezone);
                defaults.timezone
            }),
            Err(_) => defaults.timezone,
        };

        Self {
            timezone,
            open_time: time_from_env("QUIZ_OPEN_TIME", defaults.open_time),
            close_time: time_from_env("QUIZ_CLOSE_TIME", defaults.close_time),
            question_count: positive_from_env("QUIZ_QUESTION_COUNT", defaults.question_count),
            time_per_question: positive_from_env(
                "QUIZ_TIME_PER_QUESTION",
                defaults.time_per_question,
            ),
            leaderboard_limit: positive_from_env(
                "QUIZ_LEADERBOARD_LIMIT",
                defaults.leaderboard_limit,
            ),
        }
    }
}

/// Parses an `HH:MM` wall-clock time. Returns `None` for anything out of range.
pub fn parse_time_of_day(value: &str) -> Option<WindowTime> {
    let caps = TIME_OF_DAY.captures(value.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(WindowTime::new(hour, minute))
}

fn time_from_env(key: &str, fallback: WindowTime) -> WindowTime {
    match env::var(key) {
        Ok(raw) => parse_time_of_day(&raw).unwrap_or_else(|| {
            tracing::warn!("Invalid {} '{}', using {}", key, raw, fallback);
            fallback
        }),
        Err(_) => fallback,
    }
}

fn positive_from_env(key: &str, fallback: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("20:00"), Some(WindowTime::new(20, 0)));
        assert_eq!(parse_time_of_day(" 9:05 "), Some(WindowTime::new(9, 5)));
        assert_eq!(parse_time_of_day("23:59"), Some(WindowTime::new(23, 59)));
    }

    #[test]
    fn test_parse_time_of_day_rejects_garbage() {
        assert_eq!(parse_time_of_day("24:00"), None);
        assert_eq!(parse_time_of_day("12:60"), None);
        assert_eq!(parse_time_of_day("8pm"), None);
        assert_eq!(parse_time_of_day("12:5"), None);
        assert_eq!(parse_time_of_day(""), None);
    }

    #[test]
    fn test_default_settings() {
        let settings = QuizSettings::default();
        assert_eq!(settings.timezone, chrono_tz::Africa::Abidjan);
        assert_eq!(settings.question_count, 20);
        assert_eq!(settings.open_time.to_string(), "20:00");
        assert_eq!(settings.close_time.to_string(), "23:59");
    }
}
