//! # Mapping Engine
//!
//! Compiles declarative templates against the schema model and executes them
//! over source rows, emitting statements.
//!
//! Compilation fails fast on any mismatch between template and schema, and
//! orders the entities of each query so that referenced entities are built
//! before the entities pointing at them. Execution is row-isolated: a row that
//! cannot be mapped is recorded and skipped, and a single value that does not
//! clean is dropped without losing the rest of its row.
//!
//! Entity ids are fingerprints of the schema and the cleaned `keys` values, so
//! mapping the same input twice yields the same ids.

mod keys;
mod template;
mod transform;

pub use keys::{fingerprint, row_fingerprint, sign};
pub use template::{template_columns, EntityTemplate, MappingDocument, PropertyTemplate, QueryTemplate};
pub use transform::{apply_all, Transform};

use crate::error::{TemplateError, TransformError, TransformErrorKind};
use crate::model::Statement;
use crate::schema::{Property, Schema, SchemaModel};
use crate::types::{CleanContext, TypeKind};
use crate::utils::CancelToken;
use hashbrown::HashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Rows handed to the engine per parallel batch.
const BATCH_SIZE: usize = 1024;

/// One source row: column name to raw cell value.
pub type Row = BTreeMap<String, String>;

/// Supplier of source rows. Connectors (CSV, SQL...) implement this.
pub trait RowSource {
    fn rows(&self) -> Box<dyn Iterator<Item = Row> + '_>;
}

impl RowSource for [Row] {
    fn rows(&self) -> Box<dyn Iterator<Item = Row> + '_> {
        Box::new(self.iter().cloned())
    }
}

impl RowSource for Vec<Row> {
    fn rows(&self) -> Box<dyn Iterator<Item = Row> + '_> {
        self.as_slice().rows()
    }
}

/// Everything a mapping run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingOutput {
    /// Statements in row order.
    pub statements: Vec<Statement>,
    pub errors: Vec<TransformError>,
    pub rows_read: usize,
    /// Rows where at least one query failed as a whole.
    pub rows_skipped: usize,
    /// Rows no query selected.
    pub rows_filtered: usize,
    pub cancelled: bool,
}

impl MappingOutput {
    /// Property-scoped errors: values dropped from otherwise mapped rows.
    pub fn dropped_values(&self) -> impl Iterator<Item = &TransformError> {
        self.errors.iter().filter(|error| !error.skips_row())
    }
}

#[derive(Debug, Clone)]
enum ValueSource {
    Columns(Vec<String>),
    Literals(Vec<String>),
    Template(String),
    Entity(String),
}

#[derive(Debug, Clone)]
struct CompiledProperty {
    property: Arc<Property>,
    source: ValueSource,
    join: Option<String>,
    split: Option<String>,
    format: Option<String>,
    required: bool,
    transforms: Vec<Transform>,
}

#[derive(Debug, Clone)]
struct CompiledEntity {
    name: String,
    schema: Arc<Schema>,
    /// Key property names with their index into `properties`.
    keys: Vec<(String, usize)>,
    key_literal: Option<String>,
    id_column: Option<String>,
    /// Country-typed properties first; their values complete phone numbers.
    properties: Vec<CompiledProperty>,
}

#[derive(Debug, Clone)]
struct CompiledQuery {
    name: String,
    dataset: String,
    filters: Vec<(String, String)>,
    filters_not: Vec<(String, String)>,
    /// Referenced entities before referencing ones.
    entities: Vec<CompiledEntity>,
}

impl CompiledQuery {
    fn selects(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
            && !self
                .filters_not
                .iter()
                .any(|(column, value)| row.get(column) == Some(value))
    }
}

/// A compiled, immutable mapping. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct Mapping {
    model: Arc<SchemaModel>,
    namespace: Option<String>,
    first_seen: Option<String>,
    queries: Vec<CompiledQuery>,
}

struct RowResult {
    statements: Vec<Statement>,
    errors: Vec<TransformError>,
    skipped: bool,
    selected: bool,
}

impl Mapping {
    /// Validate `document` against `model` and build the execution plan.
    #[instrument(skip_all, fields(queries = document.queries.len()))]
    pub fn compile(
        model: Arc<SchemaModel>,
        document: &MappingDocument,
        default_dataset: &str,
    ) -> Result<Self, TemplateError> {
        if document.queries.is_empty() {
            return Err(TemplateError::NoQueries);
        }
        let dataset = document.dataset.as_deref().unwrap_or(default_dataset);
        let queries = document
            .queries
            .iter()
            .enumerate()
            .map(|(index, query)| compile_query(&model, index, query, dataset))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            entities = queries.iter().map(|q| q.entities.len()).sum::<usize>(),
            "mapping compiled"
        );
        Ok(Self {
            model,
            namespace: document.namespace.clone(),
            first_seen: None,
            queries,
        })
    }

    /// Stamp every emitted statement with `first_seen`.
    pub fn with_first_seen(mut self, first_seen: impl Into<String>) -> Self {
        self.first_seen = Some(first_seen.into());
        self
    }

    pub fn model(&self) -> &Arc<SchemaModel> {
        &self.model
    }

    /// Names of the compiled queries.
    pub fn query_names(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().map(|query| query.name.as_str())
    }

    /// Map every row of `source`. Rows are processed in parallel batches;
    /// output follows row order. Cancellation is checked between rows; a
    /// cancelled run returns the rows before the first unmapped one, so
    /// `rows_read` and the statements always cover a prefix of the input.
    #[instrument(skip_all)]
    pub fn run(&self, source: &dyn RowSource, cancel: &CancelToken) -> MappingOutput {
        let mut output = MappingOutput::default();
        let mut rows = source.rows();
        let mut offset = 0;
        loop {
            if cancel.is_cancelled() {
                output.cancelled = true;
                break;
            }
            let batch: Vec<Row> = rows.by_ref().take(BATCH_SIZE).collect();
            if batch.is_empty() {
                break;
            }
            let results: Vec<Option<RowResult>> = batch
                .par_iter()
                .enumerate()
                .map(|(position, row)| {
                    if cancel.is_cancelled() {
                        None
                    } else {
                        Some(self.map_row(offset + position, row))
                    }
                })
                .collect();
            offset += batch.len();
            // Rows after the first cancelled one are dropped even if mapped,
            // keeping the output a prefix of the input.
            for result in results {
                let Some(result) = result else {
                    output.cancelled = true;
                    break;
                };
                output.rows_read += 1;
                output.rows_skipped += usize::from(result.skipped);
                output.rows_filtered += usize::from(!result.selected);
                output.statements.extend(result.statements);
                output.errors.extend(result.errors);
            }
            if output.cancelled {
                break;
            }
        }
        info!(
            rows = output.rows_read,
            statements = output.statements.len(),
            skipped = output.rows_skipped,
            errors = output.errors.len(),
            cancelled = output.cancelled,
            "mapping run finished"
        );
        output
    }

    /// Map a single row through every query that selects it.
    pub fn map_row_statements(&self, index: usize, row: &Row) -> (Vec<Statement>, Vec<TransformError>) {
        let result = self.map_row(index, row);
        (result.statements, result.errors)
    }

    fn map_row(&self, index: usize, row: &Row) -> RowResult {
        let mut result = RowResult {
            statements: Vec::new(),
            errors: Vec::new(),
            skipped: false,
            selected: false,
        };
        for query in &self.queries {
            if !query.selects(row) {
                continue;
            }
            result.selected = true;
            match self.map_query(query, index, row) {
                Ok((statements, errors)) => {
                    result.statements.extend(statements);
                    result.errors.extend(errors);
                }
                Err(error) => {
                    warn!(row = index, query = %query.name, %error, "row skipped");
                    result.skipped = true;
                    result.errors.push(error);
                }
            }
        }
        result
    }

    fn map_query(
        &self,
        query: &CompiledQuery,
        index: usize,
        row: &Row,
    ) -> Result<(Vec<Statement>, Vec<TransformError>), TransformError> {
        let lineage = format!("{}#{}", query.name, index);
        let mut ids: HashMap<&str, Option<String>> = HashMap::new();
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        for entity in &query.entities {
            let error = |property: Option<&str>, kind| TransformError {
                row: index,
                entity: entity.name.clone(),
                property: property.map(str::to_string),
                kind,
            };

            let mut countries: Vec<String> = Vec::new();
            let mut values: Vec<Vec<(String, String)>> = Vec::with_capacity(entity.properties.len());
            for binding in &entity.properties {
                let name = binding.property.name.as_str();
                let raw = binding
                    .evaluate(row, &ids)
                    .map_err(|kind| error(Some(name), kind))?;
                let context = CleanContext {
                    countries: countries.clone(),
                    format: binding.format.clone(),
                };
                let mut cleaned = Vec::with_capacity(raw.len());
                for value in raw {
                    match binding.property.property_type.clean(&value, &context) {
                        Some(clean) => cleaned.push((clean, value)),
                        None => errors.push(error(
                            Some(name),
                            TransformErrorKind::Unparseable {
                                type_name: binding.property.property_type.name().to_string(),
                                value,
                            },
                        )),
                    }
                }
                if binding.required && cleaned.is_empty() {
                    let kind = match &binding.source {
                        ValueSource::Entity(target) => TransformErrorKind::MissingReference {
                            target: target.clone(),
                        },
                        _ => TransformErrorKind::RequiredMissing {
                            property: name.to_string(),
                        },
                    };
                    return Err(error(Some(name), kind));
                }
                if binding.property.kind() == TypeKind::Country {
                    countries.extend(cleaned.iter().map(|(clean, _)| clean.clone()));
                }
                values.push(cleaned);
            }

            if values.iter().all(Vec::is_empty) {
                ids.insert(entity.name.as_str(), None);
                continue;
            }

            let id = match &entity.id_column {
                Some(column) => row
                    .get(column)
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| {
                        error(
                            None,
                            TransformErrorKind::MissingColumn {
                                column: column.clone(),
                            },
                        )
                    })?
                    .to_string(),
                None => {
                    let keys: Vec<(&str, Vec<String>)> = entity
                        .keys
                        .iter()
                        .map(|(name, position)| {
                            let cleaned = values[*position].iter().map(|(clean, _)| clean.clone());
                            (name.as_str(), cleaned.collect())
                        })
                        .collect();
                    fingerprint(&entity.schema.name, entity.key_literal.as_deref(), &keys)
                        .unwrap_or_else(|| {
                            row_fingerprint(&query.name, &entity.name, entity.key_literal.as_deref(), row)
                        })
                }
            };
            let id = match &self.namespace {
                Some(namespace) => sign(namespace, &id),
                None => id,
            };

            let stamp = |statement: Statement| {
                let statement = statement.with_lineage(lineage.as_str());
                match &self.first_seen {
                    Some(first_seen) => statement.with_first_seen(first_seen.as_str()),
                    None => statement,
                }
            };
            let schema = entity.schema.name.as_str();
            statements.push(stamp(Statement::entity_marker(&id, schema, &query.dataset)));
            for (binding, cleaned) in entity.properties.iter().zip(values) {
                for (clean, original) in cleaned {
                    statements.push(stamp(
                        Statement::new(&id, schema, &binding.property.name, clean, &query.dataset)
                            .with_original(original),
                    ));
                }
            }
            ids.insert(entity.name.as_str(), Some(id));
        }

        Ok((statements, errors))
    }
}

impl CompiledProperty {
    fn evaluate(&self, row: &Row, ids: &HashMap<&str, Option<String>>) -> Result<Vec<String>, TransformErrorKind> {
        let mut values = match &self.source {
            ValueSource::Columns(columns) => {
                let mut cells = Vec::with_capacity(columns.len());
                for column in columns {
                    let cell = row.get(column).ok_or_else(|| TransformErrorKind::MissingColumn {
                        column: column.clone(),
                    })?;
                    cells.push(cell.clone());
                }
                match &self.join {
                    Some(separator) => {
                        let parts: Vec<&str> = cells
                            .iter()
                            .map(|cell| cell.trim())
                            .filter(|cell| !cell.is_empty())
                            .collect();
                        vec![parts.join(separator)]
                    }
                    None => cells,
                }
            }
            ValueSource::Literals(literals) => literals.clone(),
            ValueSource::Template(template) => vec![render(template, row)?],
            ValueSource::Entity(target) => ids
                .get(target.as_str())
                .cloned()
                .flatten()
                .into_iter()
                .collect(),
        };

        if let Some(separator) = &self.split {
            values = values
                .iter()
                .flat_map(|value| value.split(separator.as_str()).map(str::to_string))
                .collect();
        }
        Ok(values
            .into_iter()
            .map(|value| apply_all(&self.transforms, &value))
            .filter(|value| !value.trim().is_empty())
            .collect())
    }
}

fn render(template: &str, row: &Row) -> Result<String, TransformErrorKind> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let column = after[..end].trim();
        let value = row.get(column).ok_or_else(|| TransformErrorKind::MissingColumn {
            column: column.to_string(),
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn compile_query(
    model: &SchemaModel,
    index: usize,
    template: &QueryTemplate,
    default_dataset: &str,
) -> Result<CompiledQuery, TemplateError> {
    let query = template
        .name
        .clone()
        .unwrap_or_else(|| format!("query{index}"));

    let mut schemata: BTreeMap<&str, Arc<Schema>> = BTreeMap::new();
    for (entity, definition) in &template.entities {
        let schema = model
            .get(&definition.schema)
            .ok_or_else(|| TemplateError::UnknownSchema {
                query: query.clone(),
                entity: entity.clone(),
                schema: definition.schema.clone(),
            })?;
        if schema.is_abstract {
            return Err(TemplateError::AbstractSchema {
                query: query.clone(),
                entity: entity.clone(),
                schema: schema.name.clone(),
            });
        }
        schemata.insert(entity.as_str(), Arc::clone(schema));
    }

    let mut compiled: BTreeMap<&str, CompiledEntity> = BTreeMap::new();
    let mut references: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (entity, definition) in &template.entities {
        let schema = &schemata[entity.as_str()];
        let mut properties = Vec::with_capacity(definition.properties.len());
        let depends = references.entry(entity.as_str()).or_default();
        for (name, binding) in &definition.properties {
            let property = compile_property(&query, entity, schema, name, binding, &schemata)?;
            if let ValueSource::Entity(target) = &property.source {
                if let Some((target, _)) = schemata.get_key_value(target.as_str()) {
                    depends.insert(*target);
                }
            }
            properties.push(property);
        }
        // Stable: country properties move to the front, the rest keep name order.
        properties.sort_by_key(|binding| binding.property.kind() != TypeKind::Country);

        let keys = definition
            .keys
            .iter()
            .map(|key| {
                properties
                    .iter()
                    .position(|binding| binding.property.name == *key)
                    .map(|position| (key.clone(), position))
                    .ok_or_else(|| TemplateError::UnknownKey {
                        query: query.clone(),
                        entity: entity.clone(),
                        key: key.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        compiled.insert(
            entity.as_str(),
            CompiledEntity {
                name: entity.clone(),
                schema: Arc::clone(schema),
                keys,
                key_literal: definition.key_literal.clone(),
                id_column: definition.id_column.clone(),
                properties,
            },
        );
    }

    let order = generation_order(&query, &references)?;
    let entities = order
        .into_iter()
        .filter_map(|name| compiled.remove(name))
        .collect();

    Ok(CompiledQuery {
        dataset: template
            .dataset
            .clone()
            .unwrap_or_else(|| default_dataset.to_string()),
        filters: template.filters.clone().into_iter().collect(),
        filters_not: template.filters_not.clone().into_iter().collect(),
        entities,
        name: query,
    })
}

fn compile_property(
    query: &str,
    entity: &str,
    schema: &Schema,
    name: &str,
    binding: &PropertyTemplate,
    schemata: &BTreeMap<&str, Arc<Schema>>,
) -> Result<CompiledProperty, TemplateError> {
    let property = schema.get(name).ok_or_else(|| TemplateError::UnknownProperty {
        query: query.to_string(),
        entity: entity.to_string(),
        schema: schema.name.clone(),
        property: name.to_string(),
    })?;
    if property.stub {
        return Err(TemplateError::StubProperty {
            query: query.to_string(),
            entity: entity.to_string(),
            property: name.to_string(),
        });
    }

    let source = if let Some(target) = &binding.entity {
        if !property.is_entity() {
            return Err(TemplateError::NotEntityProperty {
                query: query.to_string(),
                entity: entity.to_string(),
                property: name.to_string(),
            });
        }
        let target_schema = schemata
            .get(target.as_str())
            .ok_or_else(|| TemplateError::UnknownEntityRef {
                query: query.to_string(),
                entity: entity.to_string(),
                property: name.to_string(),
                target: target.clone(),
            })?;
        if let Some(range) = &property.range {
            if !target_schema.is_a(range) {
                return Err(TemplateError::RangeMismatch {
                    query: query.to_string(),
                    entity: entity.to_string(),
                    property: name.to_string(),
                    target: target.clone(),
                    range: range.clone(),
                    schema: target_schema.name.clone(),
                });
            }
        }
        ValueSource::Entity(target.clone())
    } else if let Some(template) = &binding.template {
        ValueSource::Template(template.clone())
    } else if binding.column.is_some() || !binding.columns.is_empty() {
        ValueSource::Columns(binding.source_columns())
    } else if binding.literal.is_some() || !binding.literals.is_empty() {
        let mut literals: Vec<String> = binding.literal.iter().cloned().collect();
        literals.extend(binding.literals.iter().cloned());
        ValueSource::Literals(literals)
    } else {
        return Err(TemplateError::EmptyBinding {
            query: query.to_string(),
            entity: entity.to_string(),
            property: name.to_string(),
        });
    };

    let transforms = binding
        .transforms
        .iter()
        .map(|transform| {
            transform
                .parse::<Transform>()
                .map_err(|_| TemplateError::UnknownTransform {
                    query: query.to_string(),
                    entity: entity.to_string(),
                    property: name.to_string(),
                    transform: transform.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledProperty {
        property: Arc::clone(property),
        source,
        join: binding.join.clone(),
        split: binding.split.clone(),
        format: binding.format.clone(),
        required: binding.required,
        transforms,
    })
}

/// Kahn's algorithm over entity references; ties resolve by entity name.
fn generation_order<'a>(
    query: &str,
    references: &BTreeMap<&'a str, BTreeSet<&'a str>>,
) -> Result<Vec<&'a str>, TemplateError> {
    let mut pending: BTreeMap<&str, usize> = references
        .iter()
        .map(|(entity, depends)| (*entity, depends.len()))
        .collect();
    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(entity, _)| *entity)
        .collect();
    let mut order = Vec::with_capacity(references.len());

    while let Some(entity) = ready.pop_first() {
        pending.remove(entity);
        order.push(entity);
        for (&dependent, depends) in references {
            if !depends.contains(entity) {
                continue;
            }
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if pending.is_empty() {
        Ok(order)
    } else {
        Err(TemplateError::ReferenceCycle {
            query: query.to_string(),
            entities: pending.keys().map(|entity| entity.to_string()).collect(),
        })
    }
}
