//! # Comparison Engine
//!
//! Scores how likely two folded entities describe the same real-world object.
//!
//! Only properties present on both sides contribute. Each compared property
//! takes its best value pair from the cross product of both value sets and is
//! weighted by the base weight of its type times the specificity of that pair,
//! so an exact passport match dominates a fuzzy name match. The result is the
//! weighted mean, always in `[0, 1]` and symmetric in its arguments.

use crate::config::MatchTuning;
use crate::entity::{fold_entity, Entity};
use crate::schema::{Property, SchemaModel};
use crate::store::StatementStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome band of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// At or above the auto-merge threshold.
    Same,
    /// Between the review and auto-merge thresholds.
    Review,
    Distinct,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Decision::Same => "same",
            Decision::Review => "review",
            Decision::Distinct => "distinct",
        };
        f.write_str(name)
    }
}

/// A scored pair. `left` always sorts before `right`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub left: String,
    pub right: String,
    pub score: f64,
    pub decision: Decision,
}

impl MatchCandidate {
    pub fn new(a: &str, b: &str, score: f64, decision: Decision) -> Self {
        let (left, right) = if a <= b { (a, b) } else { (b, a) };
        Self {
            left: left.to_string(),
            right: right.to_string(),
            score,
            decision,
        }
    }
}

/// Contribution of one property to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyScore {
    pub property: String,
    pub left: String,
    pub right: String,
    pub similarity: f64,
    pub weight: f64,
}

/// Looks up referenced entities when entity-typed properties are compared
/// beyond their ids.
pub trait EntityResolver: Sync {
    fn resolve(&self, entity_id: &str) -> Option<Entity>;
}

impl EntityResolver for BTreeMap<String, Entity> {
    fn resolve(&self, entity_id: &str) -> Option<Entity> {
        self.get(entity_id).cloned()
    }
}

impl EntityResolver for hashbrown::HashMap<String, Entity> {
    fn resolve(&self, entity_id: &str) -> Option<Entity> {
        self.get(entity_id).cloned()
    }
}

/// Folds referenced entities from a store on demand.
pub struct StoreResolver<'a> {
    model: &'a SchemaModel,
    store: &'a dyn StatementStore,
}

impl<'a> StoreResolver<'a> {
    pub fn new(model: &'a SchemaModel, store: &'a dyn StatementStore) -> Self {
        Self { model, store }
    }
}

impl EntityResolver for StoreResolver<'_> {
    fn resolve(&self, entity_id: &str) -> Option<Entity> {
        fold_entity(self.model, self.store, entity_id).entity.ok()
    }
}

/// Entity comparator bound to a schema model and tuning.
#[derive(Clone, Copy)]
pub struct Comparator<'a> {
    model: &'a SchemaModel,
    tuning: &'a MatchTuning,
    resolver: Option<&'a dyn EntityResolver>,
}

impl<'a> Comparator<'a> {
    pub fn new(model: &'a SchemaModel, tuning: &'a MatchTuning) -> Self {
        Self {
            model,
            tuning,
            resolver: None,
        }
    }

    /// Compare entity references by the entities they point to, up to
    /// `compare_depth` levels.
    pub fn with_resolver(mut self, resolver: &'a dyn EntityResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn tuning(&self) -> &MatchTuning {
        self.tuning
    }

    /// Whether two entities may be compared at all: they need a common
    /// schema, and it must be matchable.
    pub fn eligible(&self, left: &Entity, right: &Entity) -> bool {
        self.model
            .common_schema(&left.schema, &right.schema)
            .is_some_and(|schema| schema.matchable)
    }

    /// Similarity in `[0, 1]`. Ineligible pairs and pairs without a shared
    /// matchable property score 0.
    pub fn score(&self, left: &Entity, right: &Entity) -> f64 {
        self.score_at_depth(left, right, self.tuning.compare_depth)
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score >= self.tuning.auto_merge_threshold {
            Decision::Same
        } else if score >= self.tuning.review_threshold {
            Decision::Review
        } else {
            Decision::Distinct
        }
    }

    /// Score and classify a pair.
    pub fn candidate(&self, left: &Entity, right: &Entity) -> MatchCandidate {
        let score = self.score(left, right);
        MatchCandidate::new(&left.id, &right.id, score, self.decide(score))
    }

    /// Per-property breakdown of a score, in property-name order.
    pub fn explain(&self, left: &Entity, right: &Entity) -> Vec<PropertyScore> {
        let (left, right) = ordered(left, right);
        self.components(left, right, self.tuning.compare_depth)
    }

    fn score_at_depth(&self, left: &Entity, right: &Entity, depth: usize) -> f64 {
        if !self.eligible(left, right) {
            return 0.0;
        }
        if left.id == right.id {
            return 1.0;
        }
        let (left, right) = ordered(left, right);
        let mut total_weight = 0.0;
        let mut weighted = 0.0;
        for component in self.components(left, right, depth) {
            total_weight += component.weight;
            weighted += component.weight * component.similarity;
        }
        if total_weight <= 0.0 {
            return 0.0;
        }
        let score = weighted / total_weight;
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }

    fn components(&self, left: &Entity, right: &Entity, depth: usize) -> Vec<PropertyScore> {
        let Some(schema) = self.model.common_schema(&left.schema, &right.schema) else {
            return Vec::new();
        };
        if !schema.matchable {
            return Vec::new();
        }

        schema
            .properties()
            .values()
            .filter(|property| property.matchable())
            .filter_map(|property| {
                let lefts = left.get(&property.name);
                let rights = right.get(&property.name);
                if lefts.is_empty() || rights.is_empty() {
                    return None;
                }
                let (similarity, specificity, l, r) =
                    self.best_pair(property, lefts, rights, depth)?;
                let weight = self.tuning.weight(property.kind())
                    * specificity.max(self.tuning.min_specificity_weight);
                Some(PropertyScore {
                    property: property.name.clone(),
                    left: l.to_string(),
                    right: r.to_string(),
                    similarity,
                    weight,
                })
            })
            .collect()
    }

    /// Best (similarity, specificity) over the cross product. Ties on
    /// similarity prefer the more specific pair.
    fn best_pair<'v>(
        &self,
        property: &Property,
        lefts: &'v [String],
        rights: &'v [String],
        depth: usize,
    ) -> Option<(f64, f64, &'v str, &'v str)> {
        let property_type = &property.property_type;
        let mut best: Option<(f64, f64, &str, &str)> = None;
        for l in lefts {
            for r in rights {
                let similarity = if property.is_entity() {
                    self.compare_references(l, r, depth)
                } else {
                    property_type.compare(l, r)
                };
                let specificity =
                    (property_type.specificity(l) + property_type.specificity(r)) / 2.0;
                let better = match best {
                    None => true,
                    Some((best_sim, best_spec, _, _)) => {
                        similarity > best_sim
                            || (similarity == best_sim && specificity > best_spec)
                    }
                };
                if better {
                    best = Some((similarity, specificity, l.as_str(), r.as_str()));
                }
            }
        }
        best
    }

    fn compare_references(&self, left: &str, right: &str, depth: usize) -> f64 {
        if left == right {
            return 1.0;
        }
        if depth == 0 {
            return 0.0;
        }
        let Some(resolver) = self.resolver else {
            return 0.0;
        };
        match (resolver.resolve(left), resolver.resolve(right)) {
            (Some(a), Some(b)) => self.score_at_depth(&a, &b, depth - 1),
            _ => 0.0,
        }
    }
}

fn ordered<'e>(a: &'e Entity, b: &'e Entity) -> (&'e Entity, &'e Entity) {
    if a.id <= b.id {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn entity(id: &str, schema: &str, properties: &[(&str, &[&str])]) -> Entity {
        Entity {
            id: id.to_string(),
            schema: schema.to_string(),
            properties: properties
                .iter()
                .map(|(name, values)| {
                    (
                        name.to_string(),
                        values.iter().map(|v| v.to_string()).collect(),
                    )
                })
                .collect(),
            datasets: BTreeSet::from(["test".to_string()]),
        }
    }

    fn model() -> SchemaModel {
        SchemaModel::default_model().unwrap()
    }

    #[test]
    fn test_identifier_match_dominates_fuzzy_name() {
        let model = model();
        let tuning = MatchTuning::default();
        let comparator = Comparator::new(&model, &tuning);
        let jon = entity(
            "a",
            "Person",
            &[
                ("name", &["Jon Smith"]),
                ("birthDate", &["1980-04-12"]),
                ("passportNumber", &["X1234567"]),
            ],
        );
        let john = entity(
            "b",
            "Person",
            &[
                ("name", &["John Smith"]),
                ("birthDate", &["1980-04-12"]),
                ("passportNumber", &["X1234567"]),
            ],
        );
        let candidate = comparator.candidate(&jon, &john);
        assert!(candidate.score >= 0.85, "score was {}", candidate.score);
        assert_eq!(candidate.decision, Decision::Same);
    }

    #[test]
    fn test_score_is_symmetric_and_bounded() {
        let model = model();
        let tuning = MatchTuning::default();
        let comparator = Comparator::new(&model, &tuning);
        let a = entity(
            "a",
            "Company",
            &[("name", &["ACME Ltd", "Acme Holdings"]), ("country", &["gb"])],
        );
        let b = entity("b", "Organization", &[("name", &["Acme Limited"]), ("country", &["gb", "us"])]);
        let ab = comparator.score(&a, &b);
        let ba = comparator.score(&b, &a);
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_identical_entities_score_one() {
        let model = model();
        let tuning = MatchTuning::default();
        let comparator = Comparator::new(&model, &tuning);
        let a = entity("a", "Person", &[("name", &["Jane Doe"]), ("nationality", &["fr"])]);
        let mut b = a.clone();
        b.id = "b".to_string();
        assert_eq!(comparator.score(&a, &b), 1.0);
        assert_eq!(comparator.score(&a, &a), 1.0);
    }

    #[test]
    fn test_unrelated_or_unmatchable_schemata_score_zero() {
        let model = model();
        let tuning = MatchTuning::default();
        let comparator = Comparator::new(&model, &tuning);
        let person = entity("a", "Person", &[("name", &["ACME"])]);
        let company = entity("b", "Company", &[("name", &["ACME"])]);
        assert_eq!(comparator.score(&person, &company), 0.0);

        let payment_a = entity("p1", "Payment", &[("amount", &["100"])]);
        let payment_b = entity("p2", "Payment", &[("amount", &["100"])]);
        assert!(!comparator.eligible(&payment_a, &payment_b));
        assert_eq!(comparator.score(&payment_a, &payment_b), 0.0);
    }

    #[test]
    fn test_absent_properties_do_not_penalize() {
        let model = model();
        let tuning = MatchTuning::default();
        let comparator = Comparator::new(&model, &tuning);
        let sparse = entity("a", "Person", &[("name", &["Jane Doe"])]);
        let rich = entity(
            "b",
            "Person",
            &[("name", &["Jane Doe"]), ("birthDate", &["1970-01-01"])],
        );
        assert_eq!(comparator.score(&sparse, &rich), 1.0);
        let explained = comparator.explain(&sparse, &rich);
        assert_eq!(explained.len(), 1);
        assert_eq!(explained[0].property, "name");
    }

    #[test]
    fn test_references_recurse_through_resolver() {
        let model = model();
        let tuning = MatchTuning::default();
        let addresses = BTreeMap::from([
            (
                "addr1".to_string(),
                entity("addr1", "Address", &[("full", &["1 Main Street, Springfield"])]),
            ),
            (
                "addr2".to_string(),
                entity("addr2", "Address", &[("full", &["1 Main St, Springfield"])]),
            ),
        ]);
        let a = entity("a", "Person", &[("addressEntity", &["addr1"])]);
        let b = entity("b", "Person", &[("addressEntity", &["addr2"])]);

        let shallow = Comparator::new(&model, &tuning);
        assert_eq!(shallow.score(&a, &b), 0.0);

        let deep = Comparator::new(&model, &tuning).with_resolver(&addresses);
        assert!(deep.score(&a, &b) > 0.5);
    }

    #[test]
    fn test_decision_bands() {
        let model = model();
        let tuning = MatchTuning::default();
        let comparator = Comparator::new(&model, &tuning);
        assert_eq!(comparator.decide(0.9), Decision::Same);
        assert_eq!(comparator.decide(0.7), Decision::Review);
        assert_eq!(comparator.decide(0.1), Decision::Distinct);
    }
}
