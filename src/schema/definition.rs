//! Serialized form of a schema taxonomy.
//!
//! One [`SchemaDefinition`] per schema. The same structures are read from JSON
//! and TOML; field names use camelCase so definitions stay interchangeable with
//! existing taxonomy files.

use crate::error::DefinitionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

fn default_type() -> String {
    "string".to_string()
}

/// A whole taxonomy file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyDocument {
    #[serde(default)]
    pub schemata: Vec<SchemaDefinition>,
}

impl TaxonomyDocument {
    pub fn from_json_str(text: &str) -> Result<Self, DefinitionError> {
        serde_json::from_str(text).map_err(|err| DefinitionError::Parse(err.to_string()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, DefinitionError> {
        toml::from_str(text).map_err(|err| DefinitionError::Parse(err.to_string()))
    }
}

/// One schema as written by a taxonomy author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default = "default_true")]
    pub matchable: bool,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,
    #[serde(default)]
    pub caption: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub edge: Option<EdgeDefinition>,
}

impl SchemaDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            plural: None,
            is_abstract: false,
            matchable: true,
            extends: Vec::new(),
            properties: BTreeMap::new(),
            caption: Vec::new(),
            required: Vec::new(),
            edge: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends.push(parent.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, definition: PropertyDefinition) -> Self {
        self.properties.insert(name.into(), definition);
        self
    }

    pub fn abstract_schema(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// One property as written by a taxonomy author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub multi: bool,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub reverse: Option<ReverseDefinition>,
    /// Overrides the type's matchable flag for this property only.
    #[serde(default)]
    pub matchable: Option<bool>,
}

impl PropertyDefinition {
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            label: None,
            description: None,
            type_name: type_name.into(),
            multi: true,
            range: None,
            reverse: None,
            matchable: None,
        }
    }

    pub fn single(mut self) -> Self {
        self.multi = false;
        self
    }

    pub fn range(mut self, schema: impl Into<String>) -> Self {
        self.range = Some(schema.into());
        self
    }

    pub fn reverse(mut self, name: impl Into<String>) -> Self {
        self.reverse = Some(ReverseDefinition {
            name: name.into(),
            label: None,
        });
        self
    }
}

/// The inverse side of an entity-typed property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseDefinition {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Marks a schema as a relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
}
