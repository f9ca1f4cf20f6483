//! # Unimodel
//!
//! A statement-based entity graph with a typed schema model, fuzzy entity
//! comparison and declarative source mapping.
//!
//! Facts are stored as append-only [`Statement`]s. Entities are folded from
//! statements on demand, compared and clustered to find duplicates, and
//! re-asserted under one canonical id per cluster. Mapping templates turn
//! tabular rows into statements with deterministic ids.

pub mod compare;
pub mod config;
pub mod dsu;
pub mod entity;
pub mod error;
pub mod graph;
pub mod index;
pub mod linker;
pub mod mapping;
pub mod model;
pub mod report;
pub mod schema;
pub mod store;
pub mod types;
pub mod utils;

#[doc(hidden)]
pub mod test_support;

// Re-export main types for convenience
pub use compare::{Comparator, Decision, MatchCandidate};
pub use config::{MatchTuning, TuningProfile, UniConfig};
pub use dsu::{Cluster, ClusterId, Clusters};
pub use entity::{Entity, FoldOutcome};
pub use error::{
    DefinitionError, SchemaConflict, StoreError, TemplateError, TransformError,
    ValidationFailure,
};
pub use graph::Graph;
pub use linker::{CanonicalPolicy, Judgement, Judgements, LinkOutcome};
pub use mapping::{Mapping, MappingDocument, Row, RowSource};
pub use model::Statement;
pub use report::RunReport;
pub use schema::{Property, Schema, SchemaModel};
pub use store::{StatementStore, Store};
pub use types::{PropertyType, TypeKind, TypeRegistry};
pub use utils::CancelToken;

use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Main API: a statement store bound to a schema model and configuration.
pub struct Unimodel {
    store: Box<dyn StatementStore>,
    model: Arc<SchemaModel>,
    config: UniConfig,
    tuning: MatchTuning,
    judgements: Judgements,
}

impl Unimodel {
    /// In-memory instance over `model` with default configuration.
    pub fn new(model: Arc<SchemaModel>) -> Self {
        let store = Store::new(Arc::clone(&model));
        Self::with_store(model, store, UniConfig::default())
    }

    /// Instance over a custom store implementation.
    pub fn with_store<S>(model: Arc<SchemaModel>, store: S, config: UniConfig) -> Self
    where
        S: StatementStore + 'static,
    {
        let tuning = config.match_tuning();
        Self {
            store: Box::new(store),
            model,
            config,
            tuning,
            judgements: Judgements::new(),
        }
    }

    /// Build from configuration: loads the configured taxonomy (or the bundled
    /// one) and an in-memory store.
    pub fn from_config(config: UniConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let model = match &config.schema.taxonomy {
            Some(path) => SchemaModel::load_path(path)
                .with_context(|| format!("loading taxonomy {}", path.display()))?,
            None => SchemaModel::default_model()?,
        };
        let model = Arc::new(model);
        let store = Store::new(Arc::clone(&model));
        Ok(Self::with_store(model, store, config))
    }

    pub fn model(&self) -> &Arc<SchemaModel> {
        &self.model
    }

    pub fn config(&self) -> &UniConfig {
        &self.config
    }

    pub fn tuning(&self) -> &MatchTuning {
        &self.tuning
    }

    pub fn store(&self) -> &dyn StatementStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn StatementStore {
        self.store.as_mut()
    }

    /// Append statements; returns how many were new.
    pub fn ingest(&mut self, statements: Vec<Statement>) -> anyhow::Result<usize> {
        Ok(self.store.add_statements(statements)?)
    }

    /// Compile a mapping with the configured dataset and first-seen stamp.
    pub fn compile_mapping(&self, document: &MappingDocument) -> anyhow::Result<Mapping> {
        let mapping = Mapping::compile(
            Arc::clone(&self.model),
            document,
            &self.config.mapping.dataset,
        )?;
        Ok(match &self.config.mapping.first_seen {
            Some(first_seen) => mapping.with_first_seen(first_seen.as_str()),
            None => mapping,
        })
    }

    /// Map `source`, store the statements and fold the touched entities.
    ///
    /// Template errors abort; row and value errors end up in the report.
    #[instrument(skip_all)]
    pub fn run_mapping(
        &mut self,
        document: &MappingDocument,
        source: &dyn RowSource,
        cancel: &CancelToken,
    ) -> anyhow::Result<RunReport> {
        let mapping = self.compile_mapping(document)?;
        let output = mapping.run(source, cancel);
        let mut report = RunReport::from_mapping(&output);

        let mut touched: Vec<String> = Vec::new();
        for statement in output.statements {
            let entity_id = statement.entity_id.clone();
            match self.store.add_statement(statement) {
                Ok(true) => {
                    report.statements_added += 1;
                    touched.push(entity_id);
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(%error, "statement rejected");
                    report.statements_rejected += 1;
                }
            }
        }
        touched.sort();
        touched.dedup();
        debug!(entities = touched.len(), "folding mapped entities");
        let outcomes: Vec<FoldOutcome> = touched.iter().map(|id| self.entity(id)).collect();
        report.record_folds(&outcomes);
        report.log_summary();
        Ok(report)
    }

    /// Fold one entity.
    pub fn entity(&self, entity_id: &str) -> FoldOutcome {
        entity::fold_entity(&self.model, self.store.as_ref(), entity_id)
    }

    /// Lazily fold every entity, in id order.
    pub fn entities(&self) -> impl Iterator<Item = FoldOutcome> + '_ {
        entity::iter_entities(&self.model, self.store.as_ref())
    }

    /// Every live statement in insertion order.
    pub fn statements(&self) -> Box<dyn Iterator<Item = &Statement> + '_> {
        self.store.statements()
    }

    /// Report over the whole store: dropped values and schema conflicts.
    pub fn report(&self) -> RunReport {
        let mut report = RunReport::new();
        report.record_folds(&entity::fold_all_parallel(&self.model, self.store.as_ref()));
        report
    }

    /// Record a human judgement for a pair; it overrides computed scores.
    pub fn judge(&mut self, a: &str, b: &str, judgement: Judgement) {
        self.judgements.decide(a, b, judgement);
    }

    pub fn judgements(&self) -> &Judgements {
        &self.judgements
    }

    fn folded_entities(&self) -> Vec<Entity> {
        entity::fold_all_parallel(&self.model, self.store.as_ref())
            .into_iter()
            .filter_map(|outcome| outcome.entity.ok())
            .collect()
    }

    /// Compare two folded entities with the configured tuning.
    pub fn compare(&self, left: &Entity, right: &Entity) -> MatchCandidate {
        let resolver = compare::StoreResolver::new(&self.model, self.store.as_ref());
        Comparator::new(&self.model, &self.tuning)
            .with_resolver(&resolver)
            .candidate(left, right)
    }

    /// Scored candidate pairs in the review band or above, best first.
    #[instrument(skip_all)]
    pub fn candidates(&self) -> Vec<MatchCandidate> {
        let index = index::BlockingIndex::build(&self.model, self.folded_entities(), &self.tuning);
        let resolver = compare::StoreResolver::new(&self.model, self.store.as_ref());
        let comparator = Comparator::new(&self.model, &self.tuning).with_resolver(&resolver);
        index.candidates(&comparator)
    }

    /// Cluster every entity in the store.
    pub fn build_clusters(&self) -> LinkOutcome {
        let candidates = self.candidates();
        let entity_ids = self.store.entity_ids();
        let ids = entity_ids.iter().map(String::as_str);
        if candidates.len() > self.tuning.partition_size {
            linker::build_clusters_partitioned(ids, &candidates, &self.judgements, &self.tuning)
        } else {
            linker::build_clusters(ids, &candidates, &self.judgements, &self.tuning)
        }
    }

    /// Statements with merged clusters re-asserted under canonical ids,
    /// using the configured policy.
    pub fn canonicalize(&self, clusters: &Clusters) -> Vec<Statement> {
        linker::canonicalize(self.store.as_ref(), clusters, &self.config.linking.policy)
    }

    /// Graph view over every cleanly folded entity.
    pub fn export_graph(&self) -> Graph {
        Graph::build(&self.model, &self.folded_entities())
    }

    /// Graph view in Graphviz DOT format.
    pub fn export_dot(&self) -> anyhow::Result<String> {
        utils::export_to_dot(&self.export_graph())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unimodel() -> Unimodel {
        Unimodel::new(Arc::new(SchemaModel::default_model().unwrap()))
    }

    #[test]
    fn test_ingest_fold_and_cluster() {
        let mut engine = unimodel();
        engine
            .ingest(vec![
                Statement::new("a", "Person", "name", "Jon Smith", "leaks"),
                Statement::new("a", "Person", "passportNumber", "X1234567", "leaks"),
                Statement::new("b", "Person", "name", "John Smith", "registry"),
                Statement::new("b", "Person", "passportNumber", "X1234567", "registry"),
                Statement::new("c", "Person", "name", "Maria Garcia", "registry"),
            ])
            .unwrap();
        assert_eq!(engine.entities().count(), 3);

        let outcome = engine.build_clusters();
        assert_eq!(outcome.clusters.len(), 2);
        assert!(outcome.clusters.cluster_of("a").unwrap().contains("b"));

        let canonical = engine.canonicalize(&outcome.clusters);
        assert!(canonical
            .iter()
            .filter(|s| s.value == "John Smith")
            .all(|s| s.entity_id == "a"));
    }

    #[test]
    fn test_negative_judgement_keeps_pair_apart() {
        let mut engine = unimodel();
        engine
            .ingest(vec![
                Statement::new("a", "Person", "passportNumber", "X1234567", "d"),
                Statement::new("b", "Person", "passportNumber", "X1234567", "d"),
            ])
            .unwrap();
        engine.judge("a", "b", Judgement::Negative);
        let outcome = engine.build_clusters();
        assert_eq!(outcome.clusters.len(), 2);
    }

    #[test]
    fn test_from_config_uses_bundled_taxonomy() {
        let engine = Unimodel::from_config(UniConfig::default()).unwrap();
        assert!(engine.model().get("Person").is_some());
        assert_eq!(engine.tuning(), &MatchTuning::default());
    }
}
