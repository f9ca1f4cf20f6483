//! # Entity Folding
//!
//! An [`Entity`] is a derived view over the statements sharing an id. Folding
//! is pure: the same statement multiset always yields the same value sets, in
//! whatever order the statements arrive. Display order is dataset, then
//! first-seen stamp, then arrival order (store insertion order).

use crate::error::{FailureReason, SchemaConflict, ValidationFailure};
use crate::model::Statement;
use crate::schema::{Property, Schema, SchemaModel};
use crate::store::StatementStore;
use hashbrown::HashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Folded view of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub schema: String,
    /// Property name to distinct values in display order.
    pub properties: BTreeMap<String, Vec<String>>,
    pub datasets: BTreeSet<String>,
}

impl Entity {
    pub fn get(&self, property: &str) -> &[String] {
        self.properties
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn first(&self, property: &str) -> Option<&str> {
        self.get(property).first().map(String::as_str)
    }

    pub fn has(&self, property: &str) -> bool {
        !self.get(property).is_empty()
    }

    /// Display name: the first value of the schema's caption properties, or the id.
    pub fn caption(&self, model: &SchemaModel) -> String {
        model
            .get(&self.schema)
            .and_then(|schema| {
                schema
                    .caption
                    .iter()
                    .find_map(|property| self.first(property))
            })
            .unwrap_or(self.id.as_str())
            .to_string()
    }

    /// Every value with its resolved property, in property-name order.
    pub fn values<'a>(
        &'a self,
        schema: &'a Schema,
    ) -> impl Iterator<Item = (&'a Arc<Property>, &'a str)> + 'a {
        self.properties.iter().flat_map(move |(name, values)| {
            schema
                .get(name)
                .into_iter()
                .flat_map(move |property| values.iter().map(move |value| (property, value.as_str())))
        })
    }
}

/// Result of folding one entity id.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub entity_id: String,
    pub entity: Result<Entity, SchemaConflict>,
    pub failures: Vec<ValidationFailure>,
}

impl FoldOutcome {
    pub fn ok(&self) -> Option<&Entity> {
        self.entity.as_ref().ok()
    }
}

/// Display order: dataset, then first-seen stamp. Used with a stable sort,
/// so ties keep arrival order.
fn display_order(left: &&Statement, right: &&Statement) -> std::cmp::Ordering {
    left.dataset
        .cmp(&right.dataset)
        .then_with(|| left.first_seen.cmp(&right.first_seen))
}

/// Fold the statements of one entity.
pub fn fold<'a, I>(model: &SchemaModel, entity_id: &str, statements: I) -> FoldOutcome
where
    I: IntoIterator<Item = &'a Statement>,
{
    let mut statements: Vec<&Statement> = statements
        .into_iter()
        .filter(|statement| statement.entity_id == entity_id)
        .collect();
    statements.sort_by(display_order);

    let schema = match model.narrowest(statements.iter().map(|s| s.schema.as_str())) {
        Ok(schema) => schema,
        Err(schemata) => {
            debug!(entity_id, ?schemata, "schema conflict while folding");
            return FoldOutcome {
                entity_id: entity_id.to_string(),
                entity: Err(SchemaConflict {
                    entity_id: entity_id.to_string(),
                    schemata,
                }),
                failures: Vec::new(),
            };
        }
    };

    let mut properties: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut datasets = BTreeSet::new();
    let mut failures = Vec::new();

    for statement in statements {
        datasets.insert(statement.dataset.clone());
        if statement.is_marker() {
            continue;
        }
        let failure = |reason| ValidationFailure {
            entity_id: entity_id.to_string(),
            property: statement.property.clone(),
            value: statement.value.clone(),
            reason,
        };
        let Some(property) = schema.get(&statement.property) else {
            failures.push(failure(FailureReason::UnknownProperty));
            continue;
        };
        if property.stub {
            failures.push(failure(FailureReason::ReverseProperty));
            continue;
        }
        if !property.property_type.validate(&statement.value) {
            failures.push(failure(FailureReason::InvalidValue));
            continue;
        }
        let key = property.property_type.normalize_key(&statement.value);
        if seen.insert((statement.property.clone(), key)) {
            properties
                .entry(statement.property.clone())
                .or_default()
                .push(statement.value.clone());
        }
    }

    FoldOutcome {
        entity_id: entity_id.to_string(),
        entity: Ok(Entity {
            id: entity_id.to_string(),
            schema: schema.name.clone(),
            properties,
            datasets,
        }),
        failures,
    }
}

/// Fold one entity straight from a store.
pub fn fold_entity(model: &SchemaModel, store: &dyn StatementStore, entity_id: &str) -> FoldOutcome {
    fold(model, entity_id, store.statements_for(entity_id))
}

/// Lazily fold every entity in the store, in entity-id order.
pub fn iter_entities<'a>(
    model: &'a SchemaModel,
    store: &'a dyn StatementStore,
) -> impl Iterator<Item = FoldOutcome> + 'a {
    store
        .entity_ids()
        .into_iter()
        .map(move |entity_id| fold_entity(model, store, &entity_id))
}

/// Fold every entity in parallel; output is in entity-id order.
pub fn fold_all_parallel(model: &SchemaModel, store: &dyn StatementStore) -> Vec<FoldOutcome> {
    store
        .entity_ids()
        .par_iter()
        .map(|entity_id| fold_entity(model, store, entity_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn model() -> Arc<SchemaModel> {
        Arc::new(SchemaModel::default_model().unwrap())
    }

    #[test]
    fn test_fold_narrows_schema() {
        let model = model();
        let statements = vec![
            Statement::new("e1", "LegalEntity", "name", "ACME Ltd", "a"),
            Statement::new("e1", "Company", "ticker", "ACME", "b"),
            Statement::entity_marker("e1", "Organization", "c"),
        ];
        let outcome = fold(&model, "e1", &statements);
        let entity = outcome.ok().unwrap();
        assert_eq!(entity.schema, "Company");
        assert_eq!(entity.datasets.len(), 3);
        assert_eq!(entity.first("ticker"), Some("ACME"));
    }

    #[test]
    fn test_fold_conflict_excludes_entity() {
        let model = model();
        let statements = vec![
            Statement::new("e1", "Person", "name", "Jon", "a"),
            Statement::new("e1", "Company", "name", "Jon Ltd", "a"),
        ];
        let outcome = fold(&model, "e1", &statements);
        let conflict = outcome.entity.unwrap_err();
        assert_eq!(conflict.schemata, vec!["Company", "Person"]);
    }

    #[test]
    fn test_fold_dedupes_by_normalized_key() {
        let model = model();
        let statements = vec![
            Statement::new("e1", "Person", "passportNumber", "X-123 456", "b"),
            Statement::new("e1", "Person", "passportNumber", "x123456", "a"),
        ];
        let entity = fold(&model, "e1", &statements).entity.unwrap();
        // Dataset "a" sorts first, so its spelling is kept.
        assert_eq!(entity.get("passportNumber"), ["x123456".to_string()]);
    }

    #[test]
    fn test_fold_keeps_insertion_order_within_dataset() {
        let model = model();
        let mut store = Store::new(Arc::clone(&model));
        let names: Vec<String> = (0..8).map(|n| format!("Name Number{n}")).collect();
        store
            .add_statements(
                names
                    .iter()
                    .map(|name| Statement::new("e1", "Person", "name", name.as_str(), "ds"))
                    .collect(),
            )
            .unwrap();
        let entity = fold_entity(&model, &store, "e1").entity.unwrap();
        assert_eq!(entity.get("name"), names.as_slice());
    }

    #[test]
    fn test_fold_reports_dropped_values() {
        let model = model();
        let statements = vec![
            Statement::new("e1", "Person", "birthDate", "not-a-date", "a"),
            Statement::new("e1", "Person", "favouriteColour", "blue", "a"),
            Statement::new("e1", "Person", "ownershipOwner", "o1", "a"),
            Statement::new("e1", "Person", "name", "Jon Smith", "a"),
        ];
        let outcome = fold(&model, "e1", &statements);
        let reasons: Vec<FailureReason> = outcome.failures.iter().map(|f| f.reason).collect();
        assert_eq!(reasons.len(), 3);
        assert!(reasons.contains(&FailureReason::InvalidValue));
        assert!(reasons.contains(&FailureReason::UnknownProperty));
        assert!(reasons.contains(&FailureReason::ReverseProperty));
        let entity = outcome.ok().unwrap();
        assert_eq!(entity.first("name"), Some("Jon Smith"));
        assert!(!entity.has("birthDate"));
    }

    #[test]
    fn test_caption_falls_back_to_id() {
        let model = model();
        let named = fold(&model, "e1", &[Statement::new("e1", "Person", "name", "Jon", "a")]);
        assert_eq!(named.ok().unwrap().caption(&model), "Jon");
        let anonymous = fold(&model, "e2", &[Statement::entity_marker("e2", "Person", "a")]);
        assert_eq!(anonymous.ok().unwrap().caption(&model), "e2");
    }

    #[test]
    fn test_parallel_fold_matches_sequential() {
        let model = model();
        let mut store = Store::new(Arc::clone(&model));
        for index in 0..20 {
            store
                .add_statement(Statement::new(
                    format!("e{index:02}"),
                    "Person",
                    "name",
                    format!("Person {index}"),
                    "ds",
                ))
                .unwrap();
        }
        let sequential: Vec<FoldOutcome> = iter_entities(&model, &store).collect();
        let parallel = fold_all_parallel(&model, &store);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.len(), 20);
    }
}
