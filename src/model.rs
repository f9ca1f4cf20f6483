//! # Data Model
//!
//! Statements are the unit of the graph: one provenance-carrying fact about
//! one property of one entity. Entities are never stored; they are folded
//! from statements on demand (see [`crate::entity`]).

use crate::utils::make_id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pseudo-property of entity-marker statements. A marker asserts that an
/// entity exists with a given schema without asserting any property value.
pub const BASE_PROPERTY: &str = "id";

/// Column order of the statement export contract.
pub const FIELDS: [&str; 10] = [
    "entity_id",
    "schema",
    "property",
    "value",
    "dataset",
    "original_value",
    "lineage",
    "first_seen",
    "prior_id",
    "id",
];

/// An immutable fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub entity_id: String,
    /// The entity's schema at the time of assertion.
    pub schema: String,
    pub property: String,
    pub value: String,
    /// Provenance source identifier.
    pub dataset: String,
    /// Value before cleaning, when it differed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    /// Free-form provenance trail (source query, row number...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<String>,
    /// Assertion timestamp (RFC 3339); orders values within a dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    /// Entity id this statement was asserted under before canonicalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_id: Option<String>,
    /// Digest of dataset, entity id, schema, property and value.
    pub id: String,
}

impl Statement {
    pub fn new(
        entity_id: impl Into<String>,
        schema: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        let entity_id = entity_id.into();
        let property = property.into();
        let value = value.into();
        let dataset = dataset.into();
        let schema = schema.into();
        let id = Self::make_statement_id(&dataset, &entity_id, &schema, &property, &value);
        Self {
            entity_id,
            schema,
            property,
            value,
            dataset,
            original_value: None,
            lineage: None,
            first_seen: None,
            prior_id: None,
            id,
        }
    }

    /// The marker statement for an entity.
    pub fn entity_marker(
        entity_id: impl Into<String>,
        schema: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        let entity_id = entity_id.into();
        let value = entity_id.clone();
        Self::new(entity_id, schema, BASE_PROPERTY, value, dataset)
    }

    /// The schema is part of the identity: the same value asserted under
    /// another schema is a distinct fact and may conflict.
    pub fn make_statement_id(
        dataset: &str,
        entity_id: &str,
        schema: &str,
        property: &str,
        value: &str,
    ) -> String {
        make_id([dataset, entity_id, schema, property, value])
    }

    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        let original = original.into();
        self.original_value = (original != self.value).then_some(original);
        self
    }

    pub fn with_lineage(mut self, lineage: impl Into<String>) -> Self {
        self.lineage = Some(lineage.into());
        self
    }

    pub fn with_first_seen(mut self, first_seen: impl Into<String>) -> Self {
        self.first_seen = Some(first_seen.into());
        self
    }

    pub fn is_marker(&self) -> bool {
        self.property == BASE_PROPERTY
    }

    /// The same fact asserted under `canonical_id`.
    ///
    /// Marker values follow the id they mark.
    pub fn reassert(&self, canonical_id: &str) -> Self {
        if self.entity_id == canonical_id {
            return self.clone();
        }
        let value = if self.is_marker() {
            canonical_id.to_string()
        } else {
            self.value.clone()
        };
        let id = Self::make_statement_id(
            &self.dataset,
            canonical_id,
            &self.schema,
            &self.property,
            &value,
        );
        Self {
            entity_id: canonical_id.to_string(),
            value,
            prior_id: Some(self.prior_id.clone().unwrap_or_else(|| self.entity_id.clone())),
            id,
            ..self.clone()
        }
    }

    /// Field values in [`FIELDS`] order; absent optionals are empty strings.
    pub fn to_row(&self) -> [&str; 10] {
        [
            self.entity_id.as_str(),
            self.schema.as_str(),
            self.property.as_str(),
            self.value.as_str(),
            self.dataset.as_str(),
            self.original_value.as_deref().unwrap_or(""),
            self.lineage.as_deref().unwrap_or(""),
            self.first_seen.as_deref().unwrap_or(""),
            self.prior_id.as_deref().unwrap_or(""),
            self.id.as_str(),
        ]
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}].{} = {:?} ({})",
            self.entity_id, self.schema, self.property, self.value, self.dataset
        )
    }
}
