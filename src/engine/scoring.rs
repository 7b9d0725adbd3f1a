// src/engine/scoring.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Skill label derived from the raw correct count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Classification {
    /// Fixed ladder on the raw correct count: <5, <10, <15, else expert.
    /// Independent of quiz level and question difficulty.
    pub fn from_correct_count(correct: i64) -> Self {
        match correct {
            c if c < 5 => Classification::Beginner,
            c if c < 10 => Classification::Intermediate,
            c if c < 15 => Classification::Advanced,
            _ => Classification::Expert,
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "beginner" => Some(Classification::Beginner),
            "intermediate" => Some(Classification::Intermediate),
            "advanced" => Some(Classification::Advanced),
            "expert" => Some(Classification::Expert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Beginner => "beginner",
            Classification::Intermediate => "intermediate",
            Classification::Advanced => "advanced",
            Classification::Expert => "expert",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `round(100 * correct / total)`, half rounding up. Zero when `total` is zero.
pub fn percentage(correct: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (200 * correct + total) / (2 * total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_boundaries() {
        let cases = [
            (0, Classification::Beginner),
            (4, Classification::Beginner),
            (5, Classification::Intermediate),
            (9, Classification::Intermediate),
            (10, Classification::Advanced),
            (14, Classification::Advanced),
            (15, Classification::Expert),
            (20, Classification::Expert),
        ];
        for (score, expected) in cases {
            assert_eq!(Classification::from_correct_count(score), expected, "score {}", score);
        }
    }

    #[test]
    fn test_percentage_out_of_twenty() {
        assert_eq!(percentage(0, 20), 0);
        assert_eq!(percentage(1, 20), 5);
        assert_eq!(percentage(13, 20), 65);
        assert_eq!(percentage(20, 20), 100);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5
    }

    #[test]
    fn test_percentage_empty_quiz() {
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn test_classification_serializes_lowercase() {
        let json = serde_json::to_string(&Classification::Advanced).unwrap();
        assert_eq!(json, "\"advanced\"");
    }
}
