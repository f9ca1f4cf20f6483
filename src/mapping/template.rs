//! Serialized mapping templates (JSON or TOML).

use crate::error::TemplateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A mapping file: one or more queries over a row source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDocument {
    /// Dataset name stamped on every statement unless a query overrides it.
    #[serde(default)]
    pub dataset: Option<String>,
    /// Secret used to sign generated ids, keeping them apart from ids of
    /// other sources that happen to use the same keys.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub queries: Vec<QueryTemplate>,
}

impl MappingDocument {
    pub fn from_json_str(text: &str) -> Result<Self, TemplateError> {
        serde_json::from_str(text).map_err(|err| TemplateError::Parse(err.to_string()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TemplateError> {
        toml::from_str(text).map_err(|err| TemplateError::Parse(err.to_string()))
    }

    /// Load a template file; `.toml` is read as TOML, anything else as JSON.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }
}

/// Row selection plus the entities generated from every selected row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemplate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dataset: Option<String>,
    /// Column equalities a row must satisfy.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    /// Column equalities a row must not satisfy.
    #[serde(default)]
    pub filters_not: BTreeMap<String, String>,
    pub entities: BTreeMap<String, EntityTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTemplate {
    pub schema: String,
    /// Properties whose cleaned values feed the entity id.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Constant mixed into the id, separating entities keyed on the same values.
    #[serde(default)]
    pub key_literal: Option<String>,
    /// Take the id verbatim from this column instead of fingerprinting.
    #[serde(default)]
    pub id_column: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyTemplate>,
}

/// Where the values of one property come from, and how they are shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTemplate {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub literal: Option<String>,
    #[serde(default)]
    pub literals: Vec<String>,
    /// `{{column}}` interpolation.
    #[serde(default)]
    pub template: Option<String>,
    /// Name of another entity in the same query.
    #[serde(default)]
    pub entity: Option<String>,
    /// Concatenate all column values with this separator.
    #[serde(default)]
    pub join: Option<String>,
    /// Explode each value on this separator.
    #[serde(default)]
    pub split: Option<String>,
    /// Parse format handed to the type's cleaner (dates).
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub transforms: Vec<String>,
}

impl PropertyTemplate {
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            column: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            literal: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            entity: Some(name.into()),
            ..Self::default()
        }
    }

    /// Every column this binding reads, template placeholders included.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.column.iter().cloned().collect();
        columns.extend(self.columns.iter().cloned());
        if let Some(template) = &self.template {
            columns.extend(template_columns(template));
        }
        columns
    }
}

/// Placeholder names of a `{{column}}` template, in order of appearance.
pub fn template_columns(template: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        columns.push(after[..end].trim().to_string());
        rest = &after[end + 2..];
    }
    columns
}
