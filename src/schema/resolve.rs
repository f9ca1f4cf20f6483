//! Two-pass resolution of schema definitions into a flattened model.
//!
//! Pass one orders the extends DAG topologically and rejects cycles. Pass two
//! walks that order, merging each parent's already-resolved property table
//! into the child, so every ancestor is visited exactly once per schema and
//! inherited properties stay shared `Arc`s.

use super::definition::{PropertyDefinition, SchemaDefinition};
use super::{Property, Schema};
use crate::error::DefinitionError;
use crate::types::{TypeKind, TypeRegistry};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

type PropertyTable = BTreeMap<String, Arc<Property>>;

pub(super) fn resolve(
    definitions: Vec<SchemaDefinition>,
    registry: &TypeRegistry,
) -> Result<BTreeMap<String, Arc<Schema>>, DefinitionError> {
    let mut by_name: BTreeMap<String, SchemaDefinition> = BTreeMap::new();
    for definition in definitions {
        if by_name.contains_key(&definition.name) {
            return Err(DefinitionError::DuplicateSchema(definition.name));
        }
        by_name.insert(definition.name.clone(), definition);
    }

    for definition in by_name.values() {
        for parent in &definition.extends {
            if !by_name.contains_key(parent) {
                return Err(DefinitionError::UnknownParent {
                    schema: definition.name.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    let order = topological_order(&by_name)?;
    let mut own = own_properties(&by_name, registry)?;
    add_reverse_stubs(&mut own)?;

    let mut resolved: BTreeMap<String, Arc<Schema>> = BTreeMap::new();
    for name in &order {
        let definition = &by_name[name];
        let schema = merge_schema(definition, own.remove(name).unwrap_or_default(), &resolved)?;
        validate_references(&schema)?;
        resolved.insert(name.clone(), Arc::new(schema));
    }

    debug!(schemata = resolved.len(), "resolved schema model");
    Ok(resolved)
}

/// Kahn's algorithm over parent -> child edges; ties broken by name.
fn topological_order(
    by_name: &BTreeMap<String, SchemaDefinition>,
) -> Result<Vec<String>, DefinitionError> {
    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for definition in by_name.values() {
        let parents: BTreeSet<&str> = definition.extends.iter().map(String::as_str).collect();
        pending.insert(definition.name.as_str(), parents.len());
        for parent in parents {
            children.entry(parent).or_default().push(definition.name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(by_name.len());

    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for &child in children.get(name).into_iter().flatten() {
            if let Some(count) = pending.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    if order.len() == by_name.len() {
        return Ok(order);
    }

    let placed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
    let stuck: BTreeSet<&str> = pending
        .keys()
        .copied()
        .filter(|name| !placed.contains(name))
        .collect();
    Err(DefinitionError::Cycle {
        path: cycle_path(by_name, &stuck),
    })
}

/// Follow unresolved parents from the first stuck schema until a name repeats.
fn cycle_path(
    by_name: &BTreeMap<String, SchemaDefinition>,
    stuck: &BTreeSet<&str>,
) -> Vec<String> {
    let mut path: Vec<String> = Vec::new();
    let mut current = stuck.first().copied();
    while let Some(name) = current {
        if let Some(start) = path.iter().position(|seen| seen == name) {
            let mut cycle = path.split_off(start);
            cycle.push(name.to_string());
            return cycle;
        }
        path.push(name.to_string());
        current = by_name[name]
            .extends
            .iter()
            .map(String::as_str)
            .find(|parent| stuck.contains(parent));
    }
    path
}

fn own_properties(
    by_name: &BTreeMap<String, SchemaDefinition>,
    registry: &TypeRegistry,
) -> Result<BTreeMap<String, PropertyTable>, DefinitionError> {
    let mut tables = BTreeMap::new();
    for definition in by_name.values() {
        let mut table = PropertyTable::new();
        for (name, spec) in &definition.properties {
            let property = build_property(&definition.name, name, spec, by_name, registry)?;
            table.insert(name.clone(), Arc::new(property));
        }
        tables.insert(definition.name.clone(), table);
    }
    Ok(tables)
}

fn build_property(
    schema: &str,
    name: &str,
    spec: &PropertyDefinition,
    by_name: &BTreeMap<String, SchemaDefinition>,
    registry: &TypeRegistry,
) -> Result<Property, DefinitionError> {
    let property_type = registry
        .by_name(&spec.type_name)
        .cloned()
        .ok_or_else(|| DefinitionError::UnknownType {
            schema: schema.to_string(),
            property: name.to_string(),
            type_name: spec.type_name.clone(),
        })?;

    if let Some(range) = &spec.range {
        if !by_name.contains_key(range) {
            return Err(DefinitionError::UnknownRange {
                schema: schema.to_string(),
                property: name.to_string(),
                range: range.clone(),
            });
        }
    }
    if spec.reverse.is_some() {
        if property_type.kind() != TypeKind::Entity {
            return Err(DefinitionError::ReverseOnValue {
                schema: schema.to_string(),
                property: name.to_string(),
            });
        }
        if spec.range.is_none() {
            return Err(DefinitionError::ReverseWithoutRange {
                schema: schema.to_string(),
                property: name.to_string(),
            });
        }
    }

    Ok(Property {
        name: name.to_string(),
        schema: schema.to_string(),
        label: spec.label.clone().unwrap_or_else(|| name.to_string()),
        description: spec.description.clone(),
        property_type,
        multi: spec.multi,
        range: spec.range.clone(),
        reverse: spec.reverse.as_ref().map(|reverse| reverse.name.clone()),
        stub: false,
        matchable: spec.matchable,
    })
}

/// Every entity-typed property with a `reverse` creates a stub on its range.
fn add_reverse_stubs(own: &mut BTreeMap<String, PropertyTable>) -> Result<(), DefinitionError> {
    let mut stubs: Vec<Property> = Vec::new();
    for table in own.values() {
        for property in table.values() {
            let (Some(reverse), Some(range)) = (&property.reverse, &property.range) else {
                continue;
            };
            stubs.push(Property {
                name: reverse.clone(),
                schema: range.clone(),
                label: reverse.clone(),
                description: None,
                property_type: Arc::clone(&property.property_type),
                multi: true,
                range: Some(property.schema.clone()),
                reverse: Some(property.name.clone()),
                stub: true,
                matchable: Some(false),
            });
        }
    }

    for stub in stubs {
        let table = own.entry(stub.schema.clone()).or_default();
        if table.contains_key(&stub.name) {
            return Err(DefinitionError::DuplicateProperty {
                schema: stub.schema.clone(),
                property: stub.name.clone(),
                origin: format!(
                    "{}:{}",
                    stub.range.clone().unwrap_or_default(),
                    stub.reverse.clone().unwrap_or_default()
                ),
            });
        }
        table.insert(stub.name.clone(), Arc::new(stub));
    }
    Ok(())
}

fn check_compatible(
    schema: &str,
    existing: &Arc<Property>,
    incoming: &Arc<Property>,
) -> Result<(), DefinitionError> {
    if Arc::ptr_eq(existing, incoming) || existing.kind() == incoming.kind() {
        return Ok(());
    }
    Err(DefinitionError::IncompatibleOverride {
        schema: schema.to_string(),
        property: incoming.name.clone(),
        origin: existing.schema.clone(),
        expected: existing.kind().to_string(),
        found: incoming.kind().to_string(),
    })
}

fn merge_schema(
    definition: &SchemaDefinition,
    own: PropertyTable,
    resolved: &BTreeMap<String, Arc<Schema>>,
) -> Result<Schema, DefinitionError> {
    let mut properties = PropertyTable::new();
    let mut ancestors = BTreeSet::new();
    let mut caption = definition.caption.clone();
    let mut required: Vec<String> = Vec::new();
    let mut edge = definition.edge.clone();

    for parent_name in &definition.extends {
        // Parents precede children in topological order.
        let Some(parent) = resolved.get(parent_name) else {
            continue;
        };
        ancestors.extend(parent.ancestors().iter().cloned());
        for (name, property) in parent.properties() {
            if let Some(existing) = properties.get(name) {
                check_compatible(&definition.name, existing, property)?;
            }
            properties.insert(name.clone(), Arc::clone(property));
        }
        if caption.is_empty() {
            caption = parent.caption.clone();
        }
        for name in &parent.required {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }
        if edge.is_none() {
            edge = parent.edge.clone();
        }
    }

    for (name, property) in own {
        if let Some(existing) = properties.get(&name) {
            check_compatible(&definition.name, existing, &property)?;
        }
        properties.insert(name, property);
    }
    for name in &definition.required {
        if !required.contains(name) {
            required.push(name.clone());
        }
    }
    ancestors.insert(definition.name.clone());

    Ok(Schema {
        name: definition.name.clone(),
        label: definition
            .label
            .clone()
            .unwrap_or_else(|| definition.name.clone()),
        plural: definition
            .plural
            .clone()
            .unwrap_or_else(|| format!("{}s", definition.name)),
        is_abstract: definition.is_abstract,
        matchable: definition.matchable,
        extends: definition.extends.clone(),
        ancestors,
        properties,
        caption,
        required,
        edge,
    })
}

fn validate_references(schema: &Schema) -> Result<(), DefinitionError> {
    let unknown = |kind: &'static str, property: &str| DefinitionError::UnknownReference {
        schema: schema.name.clone(),
        kind,
        property: property.to_string(),
    };
    for name in &schema.caption {
        if schema.get(name).is_none() {
            return Err(unknown("caption", name));
        }
    }
    for name in &schema.required {
        if schema.get(name).is_none() {
            return Err(unknown("required", name));
        }
    }
    if let Some(edge) = &schema.edge {
        for endpoint in [&edge.source, &edge.target] {
            let property = schema.get(endpoint).ok_or_else(|| unknown("edge", endpoint))?;
            if property.kind() != TypeKind::Entity {
                return Err(DefinitionError::EdgeEndpoint {
                    schema: schema.name.clone(),
                    property: endpoint.clone(),
                });
            }
        }
    }
    Ok(())
}
