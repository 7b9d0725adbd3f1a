// src/utils/html.rs

use std::collections::HashSet;

/// Strips markup from admin-supplied question text and options.
///
/// Question content is plain text: every tag is removed, the bodies of
/// `<script>` and `<style>` are dropped, and the entities ammonia writes on
/// output are decoded back so `&`, `<` and non-breaking spaces are stored as
/// the characters themselves.
pub fn clean_text(input: &str) -> String {
    let stripped = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(input)
        .to_string();

    html_escape::decode_html_entities(&stripped).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_keeps_text() {
        assert_eq!(clean_text("<b>Qui</b> a construit?"), "Qui a construit?");
        assert_eq!(clean_text("<script>alert(1)</script>Moïse"), "Moïse");
        assert_eq!(clean_text("  plain  "), "plain");
    }

    #[test]
    fn test_plain_text_is_not_escaped() {
        assert_eq!(clean_text("Salah & Zakat"), "Salah & Zakat");
        assert_eq!(clean_text("3 < 5 > 2"), "3 < 5 > 2");
        assert_eq!(clean_text("L'\"Aïd\""), "L'\"Aïd\"");
        assert_eq!(clean_text("Kaaba\u{a0}?"), "Kaaba\u{a0}?");
    }
}
