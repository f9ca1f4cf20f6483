use super::{
    collapse_spaces, dampen, edit_similarity, fold_text, sanitize_text, CleanContext,
    PropertyType, TypeKind,
};

const NAME_EDGE_PUNCTUATION: &[char] = &[',', ';', ':', '"', '\'', '-', '/', '(', ')'];

/// Names of people, organizations and things.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameType;

impl NameType {
    fn sorted_tokens(folded: &str) -> String {
        let mut tokens: Vec<&str> = folded.split(' ').collect();
        tokens.sort_unstable();
        tokens.join(" ")
    }
}

impl PropertyType for NameType {
    fn kind(&self) -> TypeKind {
        TypeKind::Name
    }

    fn max_length(&self) -> usize {
        384
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let text = sanitize_text(raw)?;
        let collapsed = collapse_spaces(&text);
        let trimmed = collapsed.trim_matches(NAME_EDGE_PUNCTUATION).trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn normalize_key(&self, value: &str) -> String {
        fold_text(value)
    }

    /// The better of the direct and the token-sorted edit similarity, so
    /// "Smith, John" and "John Smith" match.
    fn similarity(&self, left: &str, right: &str) -> f64 {
        let left = fold_text(left);
        let right = fold_text(right);
        let direct = edit_similarity(&left, &right);
        if direct >= 1.0 {
            return direct;
        }
        let sorted = edit_similarity(&Self::sorted_tokens(&left), &Self::sorted_tokens(&right));
        direct.max(sorted)
    }

    fn specificity(&self, value: &str) -> f64 {
        dampen(2, 50, &fold_text(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        let ctx = CleanContext::default();
        assert_eq!(
            NameType.clean("  \"Jane   Doe\", ", &ctx),
            Some("Jane Doe".to_string())
        );
        assert_eq!(NameType.clean(" -- ", &ctx), None);
    }

    #[test]
    fn test_fuzzy_name_similarity() {
        let score = NameType.compare("Jon Smith", "John Smith");
        assert!((score - 0.9).abs() < 1e-9, "score was {score}");
        assert_eq!(NameType.compare("Smith, John", "john smith"), 1.0);
        assert!(NameType.compare("John Smith", "Maria Garcia") < 0.5);
    }

    #[test]
    fn test_longer_names_are_more_specific() {
        let short = NameType.specificity("Li");
        let long = NameType.specificity("Alexandra Konstantinovna Petrovskaya-Ivanova");
        assert!(short < long);
        assert!((0.0..=1.0).contains(&long));
    }
}
