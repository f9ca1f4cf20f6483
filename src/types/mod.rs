//! # Property Types
//!
//! The catalogue of property types. Every type bundles four pure operations:
//! `validate`, `clean`, `compare` and `specificity`. Types are resolved once
//! into `Arc<dyn PropertyType>` handles when the schema model is loaded, so no
//! lookup by type name happens while values flow through the system.

mod address;
mod entity;
mod identifier;
mod locale;
mod name;
mod number;
mod phone;
mod temporal;
mod text;
mod web;

pub use address::AddressType;
pub use entity::EntityRefType;
pub use identifier::{ChecksumType, IbanType, IdentifierType};
pub use locale::{country_name, CountryType, LanguageType};
pub use name::NameType;
pub use number::NumberType;
pub use phone::PhoneType;
pub use temporal::DateType;
pub use text::{StringType, TextType};
pub use web::{EmailType, UrlType};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default maximum value length for types that do not declare their own.
pub const DEFAULT_MAX_LENGTH: usize = 250;

/// Identifier of a property type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    String,
    Text,
    Name,
    Address,
    Date,
    Country,
    Language,
    Phone,
    Email,
    Url,
    Identifier,
    Iban,
    Checksum,
    Number,
    Entity,
}

impl TypeKind {
    pub const ALL: [TypeKind; 15] = [
        TypeKind::String,
        TypeKind::Text,
        TypeKind::Name,
        TypeKind::Address,
        TypeKind::Date,
        TypeKind::Country,
        TypeKind::Language,
        TypeKind::Phone,
        TypeKind::Email,
        TypeKind::Url,
        TypeKind::Identifier,
        TypeKind::Iban,
        TypeKind::Checksum,
        TypeKind::Number,
        TypeKind::Entity,
    ];

    /// The identifier used in schema definitions.
    pub fn name(self) -> &'static str {
        match self {
            TypeKind::String => "string",
            TypeKind::Text => "text",
            TypeKind::Name => "name",
            TypeKind::Address => "address",
            TypeKind::Date => "date",
            TypeKind::Country => "country",
            TypeKind::Language => "language",
            TypeKind::Phone => "phone",
            TypeKind::Email => "email",
            TypeKind::Url => "url",
            TypeKind::Identifier => "identifier",
            TypeKind::Iban => "iban",
            TypeKind::Checksum => "checksum",
            TypeKind::Number => "number",
            TypeKind::Entity => "entity",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown property type: {s}"))
    }
}

/// Extra information available while cleaning a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanContext {
    /// Country codes known for the entity (used to complete national phone numbers).
    pub countries: Vec<String>,
    /// Explicit parse format (chrono syntax) for dates.
    pub format: Option<String>,
}

impl CleanContext {
    pub fn with_countries(mut self, countries: Vec<String>) -> Self {
        self.countries = countries;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Behaviour shared by all property types.
///
/// Implementations are stateless; every method is a pure function of its
/// arguments, so a single instance is shared by every property of that type.
pub trait PropertyType: fmt::Debug + Send + Sync {
    fn kind(&self) -> TypeKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether values of this type take part in entity comparison.
    fn matchable(&self) -> bool {
        true
    }

    /// Whether values of this type identify an entity on their own.
    fn pivot(&self) -> bool {
        false
    }

    fn max_length(&self) -> usize {
        DEFAULT_MAX_LENGTH
    }

    /// Convert a raw value into its canonical form, or `None` if unparseable.
    fn clean(&self, raw: &str, context: &CleanContext) -> Option<String>;

    /// Cheap structural check of a (usually already cleaned) value.
    fn validate(&self, raw: &str) -> bool {
        raw.chars().count() <= self.max_length()
            && self.clean(raw, &CleanContext::default()).is_some()
    }

    /// The form two values must share to be considered the same value.
    fn normalize_key(&self, value: &str) -> String {
        value.to_string()
    }

    /// Raw similarity. Callers go through [`PropertyType::compare`].
    fn similarity(&self, left: &str, right: &str) -> f64 {
        if self.normalize_key(left) == self.normalize_key(right) {
            1.0
        } else {
            0.0
        }
    }

    /// Similarity in `[0, 1]`, independent of argument order.
    fn compare(&self, left: &str, right: &str) -> f64 {
        let (a, b) = if left <= right {
            (left, right)
        } else {
            (right, left)
        };
        let score = self.similarity(a, b);
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }

    /// How distinguishing a value is, in `[0, 1]`.
    fn specificity(&self, _value: &str) -> f64 {
        0.0
    }
}

/// Registry of property type implementations keyed by [`TypeKind`].
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<TypeKind, Arc<dyn PropertyType>>,
}

static SHARED: Lazy<Arc<TypeRegistry>> = Lazy::new(|| Arc::new(TypeRegistry::standard()));

impl TypeRegistry {
    /// Build a registry holding every built-in type.
    pub fn standard() -> Self {
        let entries: [Arc<dyn PropertyType>; 15] = [
            Arc::new(StringType),
            Arc::new(TextType),
            Arc::new(NameType),
            Arc::new(AddressType),
            Arc::new(DateType),
            Arc::new(CountryType),
            Arc::new(LanguageType),
            Arc::new(PhoneType),
            Arc::new(EmailType),
            Arc::new(UrlType),
            Arc::new(IdentifierType),
            Arc::new(IbanType),
            Arc::new(ChecksumType),
            Arc::new(NumberType),
            Arc::new(EntityRefType),
        ];
        let types = entries
            .into_iter()
            .map(|property_type| (property_type.kind(), property_type))
            .collect();
        Self { types }
    }

    /// The process-wide standard registry.
    pub fn shared() -> Arc<TypeRegistry> {
        Arc::clone(&SHARED)
    }

    pub fn get(&self, kind: TypeKind) -> Option<&Arc<dyn PropertyType>> {
        self.types.get(&kind)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn PropertyType>> {
        TypeKind::from_str(name)
            .ok()
            .and_then(|kind| self.types.get(&kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PropertyType>> {
        self.types.values()
    }

    /// Kinds whose values take part in comparison.
    pub fn matchable_kinds(&self) -> Vec<TypeKind> {
        self.types
            .values()
            .filter(|property_type| property_type.matchable())
            .map(|property_type| property_type.kind())
            .collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Shared text helpers
// ---------------------------------------------------------------------------

/// Strip control characters (except newlines and tabs) and trim.
pub(crate) fn sanitize_text(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Collapse every run of whitespace into one space.
pub(crate) fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, replace punctuation with spaces and collapse whitespace.
pub(crate) fn fold_text(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_spaces(&mapped)
}

/// Linear ramp from 0 at `short` characters to 1 at `long` characters.
pub(crate) fn dampen(short: usize, long: usize, text: &str) -> f64 {
    let length = text.chars().count() as f64 - short as f64;
    let baseline = (long.saturating_sub(short) as f64).max(1.0);
    (length / baseline).clamp(0.0, 1.0)
}

/// Normalized Levenshtein similarity; two empty strings do not match.
pub(crate) fn edit_similarity(left: &str, right: &str) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_holds_every_kind() {
        let registry = TypeRegistry::standard();
        for kind in TypeKind::ALL {
            let property_type = registry.get(kind).expect("registered");
            assert_eq!(property_type.kind(), kind);
            assert_eq!(registry.by_name(kind.name()).map(|t| t.kind()), Some(kind));
        }
        assert!(registry.by_name("colour").is_none());
    }

    #[test]
    fn test_type_kind_serde() {
        let json = serde_json::to_string(&TypeKind::Iban).unwrap();
        assert_eq!(json, "\"iban\"");
        let kind: TypeKind = serde_json::from_str("\"identifier\"").unwrap();
        assert_eq!(kind, TypeKind::Identifier);
    }

    #[test]
    fn test_compare_is_order_independent() {
        let registry = TypeRegistry::standard();
        for kind in [TypeKind::Name, TypeKind::Address, TypeKind::Text] {
            let property_type = registry.get(kind).unwrap();
            let forward = property_type.compare("Acme Holdings", "ACME Holding Ltd");
            let backward = property_type.compare("ACME Holding Ltd", "Acme Holdings");
            assert_eq!(forward, backward);
            assert!((0.0..=1.0).contains(&forward));
        }
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(collapse_spaces("  a \t b\n c "), "a b c");
        assert_eq!(fold_text("Smith, JOHN!"), "smith john");
        assert_eq!(sanitize_text(" \u{0007} "), None);
        assert_eq!(dampen(2, 12, "ab"), 0.0);
        assert_eq!(dampen(2, 12, "abcdefghijkl"), 1.0);
        assert_eq!(edit_similarity("", ""), 0.0);
    }

    #[test]
    fn test_matchable_kinds_exclude_free_text() {
        let kinds = TypeRegistry::standard().matchable_kinds();
        assert!(kinds.contains(&TypeKind::Name));
        assert!(kinds.contains(&TypeKind::Identifier));
        assert!(!kinds.contains(&TypeKind::Text));
        assert!(!kinds.contains(&TypeKind::String));
    }
}
