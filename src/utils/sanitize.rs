// src/utils/sanitize.rs

/// Normalizes free text (answers, remarks, review notes). The text is stored
/// as written apart from surrounding whitespace.
pub fn plain_text(input: &str) -> String {
    input.trim().to_string()
}

/// Strips unsafe markup from paper content, which is rendered as HTML.
/// `<script>` elements are removed together with their content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_keeps_symbols() {
        assert_eq!(plain_text("  x < 3 && y > 2 "), "x < 3 && y > 2");
        assert_eq!(plain_text("  42 "), "42");
    }

    #[test]
    fn script_is_removed_from_markup() {
        assert_eq!(clean_html("good<script>alert(1)</script>"), "good");
        assert_eq!(clean_html("<b>bold</b>"), "<b>bold</b>");
    }
}
