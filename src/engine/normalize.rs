// src/engine/normalize.rs

/// Canonical form of a question text used for de-duplication.
///
/// Case-folds, collapses internal whitespace runs to a single space and trims.
/// Stored in `questions.normalized_text` on every write so provisioning and
/// curation compare the exact same key.
pub fn normalize_question_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_folding() {
        assert_eq!(
            normalize_question_text("  Combien de   piliers\tl'Islam\n a-t-il? "),
            "combien de piliers l'islam a-t-il?"
        );
    }

    #[test]
    fn test_variants_collapse_to_same_key() {
        let a = normalize_question_text("Quel est le premier pilier?");
        let b = normalize_question_text("QUEL est  le PREMIER pilier?");
        assert_eq!(a, b);
    }

    #[test]
    fn test_punctuation_is_significant() {
        assert_ne!(
            normalize_question_text("Who built it?"),
            normalize_question_text("Who built it")
        );
    }

    #[test]
    fn test_non_ascii_lowercase() {
        assert_eq!(normalize_question_text("ÉLÈVE  Été"), "élève été");
    }

    #[test]
    fn test_blank() {
        assert_eq!(normalize_question_text(" \t\n "), "");
    }

    #[test]
    fn test_non_breaking_space_is_whitespace() {
        assert_eq!(normalize_question_text("Kaaba\u{a0}?"), "kaaba ?");
    }
}
