//! # Store Module
//!
//! Append-only statement storage. Statements are never edited in place; a
//! correction to a single-valued property goes through [`StatementStore::supersede`].

use crate::error::StoreError;
use crate::model::Statement;
use crate::schema::SchemaModel;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage contract consumed by folding, comparison and exporters.
pub trait StatementStore: Send + Sync {
    /// Append a statement. Returns `false` if an identical statement is
    /// already stored (re-ingesting the same source is a no-op).
    fn add_statement(&mut self, statement: Statement) -> Result<bool, StoreError>;

    /// Retract `statement_id` and assert `replacement` in its place.
    fn supersede(&mut self, statement_id: &str, replacement: Statement) -> Result<(), StoreError>;

    fn get_statement(&self, statement_id: &str) -> Option<&Statement>;

    /// All live statements in insertion order. Each call starts over.
    fn statements(&self) -> Box<dyn Iterator<Item = &Statement> + '_>;

    /// Live statements of one entity in insertion order.
    fn statements_for(&self, entity_id: &str) -> Vec<&Statement>;

    /// Ids of entities with at least one live statement, sorted.
    fn entity_ids(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append many statements, stopping at the first rejection.
    fn add_statements(&mut self, statements: Vec<Statement>) -> Result<usize, StoreError> {
        let mut added = 0;
        for statement in statements {
            if self.add_statement(statement)? {
                added += 1;
            }
        }
        Ok(added)
    }
}

/// In-memory statement log.
#[derive(Debug, Clone)]
pub struct Store {
    model: Arc<SchemaModel>,
    /// Every statement ever accepted, in insertion order.
    log: Vec<Statement>,
    by_id: HashMap<String, usize>,
    by_entity: BTreeMap<String, Vec<usize>>,
    retracted: HashSet<usize>,
}

impl Store {
    pub fn new(model: Arc<SchemaModel>) -> Self {
        Self {
            model,
            log: Vec::new(),
            by_id: HashMap::new(),
            by_entity: BTreeMap::new(),
            retracted: HashSet::new(),
        }
    }

    pub fn model(&self) -> &Arc<SchemaModel> {
        &self.model
    }

    fn is_single_valued(&self, statement: &Statement) -> bool {
        self.model
            .get(&statement.schema)
            .and_then(|schema| schema.get(&statement.property))
            .is_some_and(|property| !property.multi)
    }

    fn live_positions<'a>(&'a self, entity_id: &str) -> impl Iterator<Item = usize> + 'a {
        self.by_entity
            .get(entity_id)
            .into_iter()
            .flatten()
            .copied()
            .filter(|position| !self.retracted.contains(position))
    }

    fn check_single_value(&self, statement: &Statement, ignore: Option<usize>) -> Result<(), StoreError> {
        if !self.is_single_valued(statement) {
            return Ok(());
        }
        let clash = self.live_positions(&statement.entity_id).find(|&position| {
            let existing = &self.log[position];
            Some(position) != ignore
                && existing.property == statement.property
                && existing.dataset == statement.dataset
                && existing.value != statement.value
        });
        match clash {
            Some(position) => Err(StoreError::SingleValueCollision {
                entity_id: statement.entity_id.clone(),
                property: statement.property.clone(),
                dataset: statement.dataset.clone(),
                existing: self.log[position].value.clone(),
                value: statement.value.clone(),
            }),
            None => Ok(()),
        }
    }

    fn append(&mut self, statement: Statement) {
        let position = self.log.len();
        self.by_id.insert(statement.id.clone(), position);
        self.by_entity
            .entry(statement.entity_id.clone())
            .or_default()
            .push(position);
        self.log.push(statement);
    }
}

impl StatementStore for Store {
    fn add_statement(&mut self, statement: Statement) -> Result<bool, StoreError> {
        if let Some(&position) = self.by_id.get(&statement.id) {
            if !self.retracted.contains(&position) {
                return Ok(false);
            }
        }
        self.check_single_value(&statement, None)?;
        self.append(statement);
        Ok(true)
    }

    fn supersede(&mut self, statement_id: &str, replacement: Statement) -> Result<(), StoreError> {
        let position = *self
            .by_id
            .get(statement_id)
            .filter(|position| !self.retracted.contains(*position))
            .ok_or_else(|| StoreError::UnknownStatement(statement_id.to_string()))?;

        let existing = &self.log[position];
        if existing.entity_id != replacement.entity_id || existing.property != replacement.property {
            return Err(StoreError::SupersessionMismatch {
                entity_id: existing.entity_id.clone(),
                property: existing.property.clone(),
            });
        }
        if existing.id == replacement.id {
            return Ok(());
        }
        self.check_single_value(&replacement, Some(position))?;

        self.retracted.insert(position);
        let already_live = self
            .by_id
            .get(&replacement.id)
            .is_some_and(|position| !self.retracted.contains(position));
        if !already_live {
            self.append(replacement);
        }
        Ok(())
    }

    fn get_statement(&self, statement_id: &str) -> Option<&Statement> {
        self.by_id
            .get(statement_id)
            .filter(|position| !self.retracted.contains(*position))
            .map(|&position| &self.log[position])
    }

    fn statements(&self) -> Box<dyn Iterator<Item = &Statement> + '_> {
        Box::new(
            self.log
                .iter()
                .enumerate()
                .filter(|(position, _)| !self.retracted.contains(position))
                .map(|(_, statement)| statement),
        )
    }

    fn statements_for(&self, entity_id: &str) -> Vec<&Statement> {
        self.live_positions(entity_id)
            .map(|position| &self.log[position])
            .collect()
    }

    fn entity_ids(&self) -> Vec<String> {
        self.by_entity
            .keys()
            .filter(|entity_id| self.live_positions(entity_id).next().is_some())
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.log.len() - self.retracted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::new(Arc::new(SchemaModel::default_model().unwrap()))
    }

    #[test]
    fn test_store_creation() {
        let store = store();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.entity_ids().is_empty());
    }

    #[test]
    fn test_duplicate_statements_are_ignored() {
        let mut store = store();
        let stmt = Statement::new("p1", "Person", "name", "Jon Smith", "ds");
        assert!(store.add_statement(stmt.clone()).unwrap());
        assert!(!store.add_statement(stmt).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_conflicting_schema_is_kept_and_surfaces_in_fold() {
        let model = Arc::new(SchemaModel::default_model().unwrap());
        let mut store = Store::new(Arc::clone(&model));
        assert!(store
            .add_statement(Statement::new("e1", "Person", "name", "ACME", "ds"))
            .unwrap());
        assert!(store
            .add_statement(Statement::new("e1", "Company", "name", "ACME", "ds"))
            .unwrap());
        assert_eq!(store.len(), 2);

        let outcome = crate::entity::fold_entity(&model, &store, "e1");
        let conflict = outcome.entity.unwrap_err();
        assert_eq!(conflict.schemata, vec!["Company", "Person"]);

        store
            .add_statements(vec![
                Statement::entity_marker("e2", "Person", "ds"),
                Statement::entity_marker("e2", "Company", "ds"),
            ])
            .unwrap();
        assert!(crate::entity::fold_entity(&model, &store, "e2").entity.is_err());
    }

    #[test]
    fn test_multi_valued_properties_accumulate() {
        let mut store = store();
        store
            .add_statements(vec![
                Statement::new("p1", "Person", "name", "Jon Smith", "ds"),
                Statement::new("p1", "Person", "name", "John Smith", "ds"),
            ])
            .unwrap();
        assert_eq!(store.statements_for("p1").len(), 2);
    }

    #[test]
    fn test_single_value_collision_needs_supersession() {
        let mut store = store();
        let first = Statement::new("p1", "Person", "gender", "male", "ds");
        store.add_statement(first.clone()).unwrap();

        let correction = Statement::new("p1", "Person", "gender", "female", "ds");
        let err = store.add_statement(correction.clone()).unwrap_err();
        assert!(matches!(err, StoreError::SingleValueCollision { .. }));

        // A different dataset may disagree.
        assert!(store
            .add_statement(Statement::new("p1", "Person", "gender", "female", "other"))
            .unwrap());

        store.supersede(&first.id, correction.clone()).unwrap();
        assert!(store.get_statement(&first.id).is_none());
        assert!(store.get_statement(&correction.id).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_supersede_rejects_other_property() {
        let mut store = store();
        let first = Statement::new("p1", "Person", "gender", "male", "ds");
        store.add_statement(first.clone()).unwrap();
        let err = store
            .supersede(&first.id, Statement::new("p1", "Person", "name", "x", "ds"))
            .unwrap_err();
        assert!(matches!(err, StoreError::SupersessionMismatch { .. }));
        assert!(matches!(
            store.supersede("missing", first),
            Err(StoreError::UnknownStatement(_))
        ));
    }

    #[test]
    fn test_statements_are_restartable_and_ordered() {
        let mut store = store();
        store
            .add_statements(vec![
                Statement::new("b", "Person", "name", "B", "ds"),
                Statement::new("a", "Person", "name", "A", "ds"),
            ])
            .unwrap();
        let first: Vec<_> = store.statements().map(|s| s.entity_id.clone()).collect();
        let second: Vec<_> = store.statements().map(|s| s.entity_id.clone()).collect();
        assert_eq!(first, vec!["b", "a"]);
        assert_eq!(first, second);
        assert_eq!(store.entity_ids(), vec!["a".to_string(), "b".to_string()]);
    }
}
