use super::{CleanContext, PropertyType, TypeKind};
use once_cell::sync::Lazy;
use regex::Regex;

static ENTITY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._:-]+$").expect("valid entity id regex"));

/// References to other entities by id.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityRefType;

impl PropertyType for EntityRefType {
    fn kind(&self) -> TypeKind {
        TypeKind::Entity
    }

    fn pivot(&self) -> bool {
        true
    }

    fn max_length(&self) -> usize {
        128
    }

    fn clean(&self, raw: &str, _context: &CleanContext) -> Option<String> {
        let id = raw.trim();
        if id.len() <= self.max_length() && ENTITY_ID.is_match(id) {
            Some(id.to_string())
        } else {
            None
        }
    }

    fn specificity(&self, _value: &str) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids() {
        let ctx = CleanContext::default();
        assert_eq!(
            EntityRefType.clean(" acme.3f2a9c ", &ctx),
            Some("acme.3f2a9c".to_string())
        );
        assert_eq!(EntityRefType.clean("has space", &ctx), None);
        assert_eq!(EntityRefType.clean(&"x".repeat(129), &ctx), None);
        assert_eq!(EntityRefType.compare("a-1", "a-1"), 1.0);
        assert_eq!(EntityRefType.compare("a-1", "a-2"), 0.0);
    }
}
