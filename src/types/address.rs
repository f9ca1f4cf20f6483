use super::{
    collapse_spaces, dampen, edit_similarity, fold_text, sanitize_text, CleanContext,
    PropertyType, TypeKind,
};

/// Postal addresses as a single formatted line.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressType;

impl PropertyType for AddressType {
    fn kind(&self) -> TypeKind {
        TypeKind::Address
    }

    fn pivot(&self) -> bool {
        true
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let text = sanitize_text(raw)?;
        let parts: Vec<String> = text
            .split(|c| c == '\n' || c == ',')
            .map(collapse_spaces)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    fn normalize_key(&self, value: &str) -> String {
        fold_text(value)
    }

    fn similarity(&self, left: &str, right: &str) -> f64 {
        edit_similarity(&fold_text(left), &fold_text(right))
    }

    fn specificity(&self, value: &str) -> f64 {
        dampen(10, 60, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_lines_are_joined() {
        let ctx = CleanContext::default();
        assert_eq!(
            AddressType.clean("Main Street 1\n\n10115   Berlin,, Germany", &ctx),
            Some("Main Street 1, 10115 Berlin, Germany".to_string())
        );
        assert_eq!(AddressType.clean(" , \n ", &ctx), None);
    }

    #[test]
    fn test_address_normalized_equality() {
        assert_eq!(
            AddressType.normalize_key("Main Street 1, Berlin"),
            AddressType.normalize_key("MAIN STREET 1 BERLIN")
        );
        assert!(AddressType.compare("Main Street 1, Berlin", "Main Str. 1, Berlin") > 0.8);
    }
}
