use super::{
    collapse_spaces, edit_similarity, fold_text, sanitize_text, CleanContext, PropertyType,
    TypeKind,
};

/// Short single-line labels (titles, statuses, roles).
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl PropertyType for StringType {
    fn kind(&self) -> TypeKind {
        TypeKind::String
    }

    fn matchable(&self) -> bool {
        false
    }

    fn max_length(&self) -> usize {
        1024
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        sanitize_text(raw).map(|text| collapse_spaces(&text))
    }

    fn normalize_key(&self, value: &str) -> String {
        fold_text(value)
    }

    fn similarity(&self, left: &str, right: &str) -> f64 {
        edit_similarity(&fold_text(left), &fold_text(right))
    }
}

/// Free text. Line breaks are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextType;

impl PropertyType for TextType {
    fn kind(&self) -> TypeKind {
        TypeKind::Text
    }

    fn matchable(&self) -> bool {
        false
    }

    fn max_length(&self) -> usize {
        65_000
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        sanitize_text(raw)
    }

    fn normalize_key(&self, value: &str) -> String {
        fold_text(value)
    }

    fn similarity(&self, left: &str, right: &str) -> f64 {
        edit_similarity(&fold_text(left), &fold_text(right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_is_single_line() {
        let ctx = CleanContext::default();
        assert_eq!(
            StringType.clean("  managing\n  director ", &ctx),
            Some("managing director".to_string())
        );
        assert_eq!(StringType.clean("   ", &ctx), None);
    }

    #[test]
    fn test_text_keeps_paragraphs() {
        let ctx = CleanContext::default();
        let cleaned = TextType.clean("first line\nsecond line\u{0000}", &ctx);
        assert_eq!(cleaned, Some("first line\nsecond line".to_string()));
    }

    #[test]
    fn test_text_is_not_matchable() {
        assert!(!TextType.matchable());
        assert!(!StringType.matchable());
        assert_eq!(TextType.specificity("anything at all"), 0.0);
    }
}
