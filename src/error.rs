//! # Error Taxonomy
//!
//! Load-time errors (`DefinitionError`, `TemplateError`) abort a run. Per-record
//! errors (`ValidationFailure`, `SchemaConflict`, `TransformError`) are collected
//! into a [`crate::report::RunReport`] and never abort.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A schema taxonomy that cannot be resolved. Fatal at load time.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("schema definitions could not be parsed: {0}")]
    Parse(String),
    #[error("failed to read schema definitions from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("schema {schema} extends unknown schema {parent}")]
    UnknownParent { schema: String, parent: String },
    #[error("inheritance cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("property {schema}:{property} has unknown type {type_name}")]
    UnknownType {
        schema: String,
        property: String,
        type_name: String,
    },
    #[error("property {schema}:{property} has unknown range {range}")]
    UnknownRange {
        schema: String,
        property: String,
        range: String,
    },
    #[error("property {schema}:{property} declares a reverse but is not entity-typed")]
    ReverseOnValue { schema: String, property: String },
    #[error("property {schema}:{property} declares a reverse but has no range")]
    ReverseWithoutRange { schema: String, property: String },
    #[error(
        "property {schema}:{property} is {found} but {origin} defines it as {expected}"
    )]
    IncompatibleOverride {
        schema: String,
        property: String,
        origin: String,
        expected: String,
        found: String,
    },
    #[error("schema {schema} declares {kind} property {property}, which it does not have")]
    UnknownReference {
        schema: String,
        kind: &'static str,
        property: String,
    },
    #[error("edge endpoint {schema}:{property} must be an entity-typed property")]
    EdgeEndpoint { schema: String, property: String },
    #[error("schema {schema} defines {property} twice (once as a reverse of {origin})")]
    DuplicateProperty {
        schema: String,
        property: String,
        origin: String,
    },
    #[error("schema {0} is defined more than once")]
    DuplicateSchema(String),
}

/// A mapping template inconsistent with the schema model. Fatal at compile time.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("mapping template could not be parsed: {0}")]
    Parse(String),
    #[error("failed to read mapping template from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mapping defines no queries")]
    NoQueries,
    #[error("query {query}: entity {entity} uses unknown schema {schema}")]
    UnknownSchema {
        query: String,
        entity: String,
        schema: String,
    },
    #[error("query {query}: entity {entity} uses abstract schema {schema}")]
    AbstractSchema {
        query: String,
        entity: String,
        schema: String,
    },
    #[error("query {query}: entity {entity} has no property {schema}:{property}")]
    UnknownProperty {
        query: String,
        entity: String,
        schema: String,
        property: String,
    },
    #[error("query {query}: entity {entity} assigns reverse-only property {property}")]
    StubProperty {
        query: String,
        entity: String,
        property: String,
    },
    #[error("query {query}: {entity}.{property} binds no value source")]
    EmptyBinding {
        query: String,
        entity: String,
        property: String,
    },
    #[error("query {query}: {entity}.{property} references unknown entity {target}")]
    UnknownEntityRef {
        query: String,
        entity: String,
        property: String,
        target: String,
    },
    #[error("query {query}: {entity}.{property} references an entity but is not entity-typed")]
    NotEntityProperty {
        query: String,
        entity: String,
        property: String,
    },
    #[error("query {query}: {entity}.{property} expects {range}, but {target} is {schema}")]
    RangeMismatch {
        query: String,
        entity: String,
        property: String,
        target: String,
        range: String,
        schema: String,
    },
    #[error("query {query}: entity references form a cycle through {}", .entities.join(", "))]
    ReferenceCycle { query: String, entities: Vec<String> },
    #[error("query {query}: entity {entity} uses key {key}, which is not a bound property")]
    UnknownKey {
        query: String,
        entity: String,
        key: String,
    },
    #[error("query {query}: {entity}.{property} uses unknown transform {transform}")]
    UnknownTransform {
        query: String,
        entity: String,
        property: String,
        transform: String,
    },
}

/// A value that failed its property type's validation during folding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{entity_id}: dropped {property}={value:?} ({reason})")]
pub struct ValidationFailure {
    pub entity_id: String,
    pub property: String,
    pub value: String,
    pub reason: FailureReason,
}

/// Why a value was dropped while folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The value is not valid for the property's type.
    InvalidValue,
    /// The entity's schema has no such property.
    UnknownProperty,
    /// The property only exists as the inverse of another property.
    ReverseProperty,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::InvalidValue => "invalid value",
            Self::UnknownProperty => "unknown property",
            Self::ReverseProperty => "reverse property",
        };
        f.write_str(text)
    }
}

/// Folding found no schema consistent with every statement of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{entity_id}: no common schema for [{}]", .schemata.join(", "))]
pub struct SchemaConflict {
    pub entity_id: String,
    pub schemata: Vec<String>,
}

/// A row-level (or property-level) failure while executing a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("row {row}, entity {entity}: {kind}")]
pub struct TransformError {
    pub row: usize,
    pub entity: String,
    pub property: Option<String>,
    pub kind: TransformErrorKind,
}

impl TransformError {
    /// Whether this error caused the whole row to be skipped.
    pub fn skips_row(&self) -> bool {
        !matches!(self.kind, TransformErrorKind::Unparseable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformErrorKind {
    #[error("column {column} is missing from the row")]
    MissingColumn { column: String },
    #[error("value {value:?} is not a valid {type_name}")]
    Unparseable { value: String, type_name: String },
    #[error("required property {property} produced no value")]
    RequiredMissing { property: String },
    #[error("referenced entity {target} was not generated for this row")]
    MissingReference { target: String },
}

/// Statement store rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(
        "{entity_id}: {property} is single-valued in {dataset}; {existing:?} must be superseded before asserting {value:?}"
    )]
    SingleValueCollision {
        entity_id: String,
        property: String,
        dataset: String,
        existing: String,
        value: String,
    },
    #[error("statement {0} is not in the store")]
    UnknownStatement(String),
    #[error("superseding statement must describe {entity_id}:{property}")]
    SupersessionMismatch { entity_id: String, property: String },
}
