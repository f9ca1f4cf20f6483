//! # Schema Model
//!
//! A taxonomy of entity schemata with multiple inheritance. Definitions are
//! resolved once at load time into flattened, cached property tables; after
//! that the model is immutable and shared by reference.

mod definition;
mod resolve;

pub use definition::{
    EdgeDefinition, PropertyDefinition, ReverseDefinition, SchemaDefinition, TaxonomyDocument,
};

use crate::error::DefinitionError;
use crate::types::{PropertyType, TypeKind, TypeRegistry};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

const DEFAULT_TAXONOMY: &str = include_str!("default.json");

/// A resolved property. Inherited properties are the same `Arc` in every
/// schema that has them.
#[derive(Clone)]
pub struct Property {
    pub name: String,
    /// The schema that declares this property.
    pub schema: String,
    pub label: String,
    pub description: Option<String>,
    pub property_type: Arc<dyn PropertyType>,
    pub multi: bool,
    /// Schema constraint for entity references.
    pub range: Option<String>,
    /// Name of the inverse property on `range`.
    pub reverse: Option<String>,
    /// Generated from another property's `reverse`; never asserted directly.
    pub stub: bool,
    matchable: Option<bool>,
}

impl Property {
    pub fn kind(&self) -> TypeKind {
        self.property_type.kind()
    }

    /// `Schema:property`
    pub fn qname(&self) -> String {
        format!("{}:{}", self.schema, self.name)
    }

    pub fn is_entity(&self) -> bool {
        self.kind() == TypeKind::Entity
    }

    pub fn matchable(&self) -> bool {
        !self.stub && self.matchable.unwrap_or_else(|| self.property_type.matchable())
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("qname", &self.qname())
            .field("type", &self.kind())
            .field("multi", &self.multi)
            .field("range", &self.range)
            .field("reverse", &self.reverse)
            .field("stub", &self.stub)
            .finish()
    }
}

/// A resolved schema.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub label: String,
    pub plural: String,
    pub is_abstract: bool,
    /// Whether entities of this schema take part in deduplication.
    pub matchable: bool,
    pub extends: Vec<String>,
    pub caption: Vec<String>,
    pub required: Vec<String>,
    pub edge: Option<EdgeDefinition>,
    ancestors: BTreeSet<String>,
    properties: BTreeMap<String, Arc<Property>>,
}

impl Schema {
    /// Every schema this one descends from, itself included.
    pub fn ancestors(&self) -> &BTreeSet<String> {
        &self.ancestors
    }

    pub fn is_a(&self, other: &str) -> bool {
        self.ancestors.contains(other)
    }

    pub fn get(&self, property: &str) -> Option<&Arc<Property>> {
        self.properties.get(property)
    }

    pub fn properties(&self) -> &BTreeMap<String, Arc<Property>> {
        &self.properties
    }

    pub fn matchable_properties(&self) -> Vec<Arc<Property>> {
        self.properties
            .values()
            .filter(|property| property.matchable())
            .cloned()
            .collect()
    }

    pub fn is_edge(&self) -> bool {
        self.edge.is_some()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Schema {}

/// The resolved taxonomy.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    schemata: BTreeMap<String, Arc<Schema>>,
    registry: Arc<TypeRegistry>,
}

impl SchemaModel {
    /// Resolve definitions against the shared type registry.
    pub fn from_definitions(definitions: Vec<SchemaDefinition>) -> Result<Self, DefinitionError> {
        Self::with_registry(definitions, TypeRegistry::shared())
    }

    #[instrument(skip_all, fields(definitions = definitions.len()))]
    pub fn with_registry(
        definitions: Vec<SchemaDefinition>,
        registry: Arc<TypeRegistry>,
    ) -> Result<Self, DefinitionError> {
        let schemata = resolve::resolve(definitions, &registry)?;
        Ok(Self { schemata, registry })
    }

    pub fn from_json_str(text: &str) -> Result<Self, DefinitionError> {
        Self::from_definitions(TaxonomyDocument::from_json_str(text)?.schemata)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, DefinitionError> {
        Self::from_definitions(TaxonomyDocument::from_toml_str(text)?.schemata)
    }

    /// Load a taxonomy file; `.toml` files are read as TOML, anything else as JSON.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }

    /// The bundled taxonomy (Thing, Person, Company, Ownership, ...).
    pub fn default_model() -> Result<Self, DefinitionError> {
        Self::from_json_str(DEFAULT_TAXONOMY)
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> {
        self.schemata.get(name)
    }

    pub fn schemata(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.schemata.values()
    }

    pub fn len(&self) -> usize {
        self.schemata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemata.is_empty()
    }

    /// Look up `Schema:property`.
    pub fn property(&self, qname: &str) -> Option<&Arc<Property>> {
        let (schema, property) = qname.split_once(':')?;
        self.get(schema)?.get(property)
    }

    /// Whether `schema` is `other` or one of its descendants.
    pub fn is_a(&self, schema: &str, other: &str) -> bool {
        self.get(schema).is_some_and(|schema| schema.is_a(other))
    }

    /// The more specific of two related schemata, or `None` when neither
    /// descends from the other.
    pub fn common_schema(&self, left: &str, right: &str) -> Option<&Arc<Schema>> {
        let left = self.get(left)?;
        let right = self.get(right)?;
        if left.is_a(&right.name) {
            Some(left)
        } else if right.is_a(&left.name) {
            Some(right)
        } else {
            None
        }
    }

    /// Fold [`SchemaModel::common_schema`] over several names.
    ///
    /// Returns the sorted distinct names on conflict (or when a name is unknown).
    pub fn narrowest<'a, I>(&self, names: I) -> Result<&Arc<Schema>, Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: BTreeSet<&str> = names.into_iter().collect();
        let conflict = || names.iter().map(|name| name.to_string()).collect::<Vec<_>>();
        let mut iter = names.iter();
        let first = iter.next().ok_or_else(Vec::new)?;
        let mut current = self.get(first).ok_or_else(conflict)?;
        for name in iter {
            current = self
                .common_schema(&current.name, name)
                .ok_or_else(conflict)?;
        }
        Ok(current)
    }

    pub fn matchable_properties(&self, schema: &str) -> Vec<Arc<Property>> {
        self.get(schema)
            .map(|schema| schema.matchable_properties())
            .unwrap_or_default()
    }

    /// Schemata that descend from `name`, excluding itself.
    pub fn descendants(&self, name: &str) -> Vec<&Arc<Schema>> {
        self.schemata
            .values()
            .filter(|schema| schema.name != name && schema.is_a(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SchemaModel {
        SchemaModel::default_model().expect("bundled taxonomy resolves")
    }

    #[test]
    fn test_default_model_loads() {
        let model = model();
        for name in [
            "Thing",
            "LegalEntity",
            "Person",
            "Organization",
            "Company",
            "Ownership",
            "Payment",
            "Document",
        ] {
            assert!(model.get(name).is_some(), "missing {name}");
        }
        assert!(model.get("Thing").unwrap().is_abstract);
    }

    #[test]
    fn test_diamond_shares_properties() {
        let model = model();
        let company = model.get("Company").unwrap();
        assert!(company.is_a("Organization"));
        assert!(company.is_a("Asset"));
        assert!(company.is_a("Thing"));

        let via_org = model.get("Organization").unwrap().get("name").unwrap();
        let via_asset = model.get("Asset").unwrap().get("name").unwrap();
        let on_company = company.get("name").unwrap();
        assert!(Arc::ptr_eq(via_org, via_asset));
        assert!(Arc::ptr_eq(via_org, on_company));
        assert_eq!(on_company.schema, "Thing");
    }

    #[test]
    fn test_common_schema() {
        let model = model();
        assert_eq!(
            model.common_schema("LegalEntity", "Person").map(|s| s.name.as_str()),
            Some("Person")
        );
        assert_eq!(
            model.common_schema("Company", "Organization").map(|s| s.name.as_str()),
            Some("Company")
        );
        assert!(model.common_schema("Person", "Company").is_none());
        assert!(model.common_schema("Person", "Nope").is_none());
    }

    #[test]
    fn test_narrowest() {
        let model = model();
        let narrowest = model.narrowest(["Thing", "LegalEntity", "Person"]).unwrap();
        assert_eq!(narrowest.name, "Person");
        let conflict = model.narrowest(["Person", "Company"]).unwrap_err();
        assert_eq!(conflict, vec!["Company".to_string(), "Person".to_string()]);
    }

    #[test]
    fn test_reverse_stubs() {
        let model = model();
        let stub = model.property("LegalEntity:ownershipOwner").unwrap();
        assert!(stub.stub);
        assert_eq!(stub.range.as_deref(), Some("Ownership"));
        assert_eq!(stub.reverse.as_deref(), Some("owner"));
        assert!(!stub.matchable());
        // Inherited by descendants of the range.
        assert!(model.property("Company:ownershipOwner").is_some());
    }

    #[test]
    fn test_matchable_properties() {
        let model = model();
        let names: Vec<String> = model
            .matchable_properties("Person")
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert!(names.contains(&"name".to_string()));
        assert!(names.contains(&"passportNumber".to_string()));
        assert!(names.contains(&"birthDate".to_string()));
        assert!(!names.contains(&"notes".to_string()));
        assert!(!names.contains(&"ownershipOwner".to_string()));
    }

    #[test]
    fn test_descendants() {
        let model = model();
        let names: Vec<&str> = model
            .descendants("Vehicle")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Vessel"]);
    }

    #[test]
    fn test_edges() {
        let model = model();
        let ownership = model.get("Ownership").unwrap();
        let edge = ownership.edge.as_ref().unwrap();
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("owner", "asset"));
        assert!(!ownership.matchable);
    }
}
