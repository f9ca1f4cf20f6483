//! # Blocking Index
//!
//! Generates candidate pairs without comparing every entity to every other.
//! Each entity is indexed under blocking tokens derived from its matchable
//! values: whole normalized keys for pivot types (identifiers, emails,
//! addresses) and single words for everything else. Two entities sharing a
//! token become a candidate pair.

use crate::compare::{Comparator, Decision, MatchCandidate};
use crate::config::MatchTuning;
use crate::entity::Entity;
use crate::schema::SchemaModel;
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Inverted index from blocking token to entity positions.
#[derive(Debug, Clone, Default)]
pub struct BlockingIndex {
    entities: Vec<Entity>,
    postings: HashMap<String, Vec<u32>>,
    hot_key_threshold: usize,
    candidate_cap: usize,
}

/// Counters from pair generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockingStats {
    pub tokens: usize,
    pub hot_tokens: usize,
    pub pairs: usize,
    pub capped: usize,
}

impl BlockingIndex {
    #[instrument(skip_all, fields(entities = entities.len()))]
    pub fn build(model: &SchemaModel, entities: Vec<Entity>, tuning: &MatchTuning) -> Self {
        let mut postings: HashMap<String, Vec<u32>> = HashMap::new();
        for (position, entity) in entities.iter().enumerate() {
            for token in blocking_tokens(model, entity, tuning.min_token_length) {
                postings.entry(token).or_default().push(position as u32);
            }
        }
        debug!(tokens = postings.len(), "blocking index built");
        Self {
            entities,
            postings,
            hot_key_threshold: tuning.hot_key_threshold,
            candidate_cap: tuning.candidate_cap,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities indexed under `token`.
    pub fn lookup(&self, token: &str) -> impl Iterator<Item = &Entity> {
        self.postings
            .get(token)
            .into_iter()
            .flatten()
            .map(|&position| &self.entities[position as usize])
    }

    /// Candidate pairs as entity positions, sorted. Tokens are visited in
    /// sorted order so the per-entity cap always drops the same pairs.
    pub fn pairs(&self) -> (Vec<(u32, u32)>, BlockingStats) {
        let mut stats = BlockingStats {
            tokens: self.postings.len(),
            ..BlockingStats::default()
        };
        let mut tokens: Vec<&String> = self.postings.keys().collect();
        tokens.sort_unstable();

        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut fan_out: HashMap<u32, usize> = HashMap::new();
        for token in tokens {
            let posting = &self.postings[token];
            if posting.len() > self.hot_key_threshold {
                stats.hot_tokens += 1;
                continue;
            }
            for (offset, &a) in posting.iter().enumerate() {
                for &b in &posting[offset + 1..] {
                    let pair = if a < b { (a, b) } else { (b, a) };
                    if seen.contains(&pair) {
                        continue;
                    }
                    let over_cap = [pair.0, pair.1].iter().any(|entity| {
                        fan_out.get(entity).copied().unwrap_or(0) >= self.candidate_cap
                    });
                    if over_cap {
                        stats.capped += 1;
                        continue;
                    }
                    seen.insert(pair);
                    *fan_out.entry(pair.0).or_default() += 1;
                    *fan_out.entry(pair.1).or_default() += 1;
                }
            }
        }

        let mut pairs: Vec<(u32, u32)> = seen.into_iter().collect();
        pairs.sort_unstable();
        stats.pairs = pairs.len();
        (pairs, stats)
    }

    /// Score every blocked pair in parallel and keep those at or above the
    /// review threshold, best first (ties by entity ids).
    #[instrument(skip_all, fields(entities = self.entities.len()))]
    pub fn candidates(&self, comparator: &Comparator<'_>) -> Vec<MatchCandidate> {
        let (pairs, stats) = self.pairs();
        debug!(
            pairs = stats.pairs,
            hot_tokens = stats.hot_tokens,
            capped = stats.capped,
            "scoring blocked pairs"
        );
        let mut candidates: Vec<MatchCandidate> = pairs
            .par_iter()
            .filter_map(|&(a, b)| {
                let left = &self.entities[a as usize];
                let right = &self.entities[b as usize];
                if left.id == right.id || !comparator.eligible(left, right) {
                    return None;
                }
                let candidate = comparator.candidate(left, right);
                (candidate.decision != Decision::Distinct).then_some(candidate)
            })
            .collect();
        sort_candidates(&mut candidates);
        candidates
    }
}

/// Best score first, then by ids.
pub fn sort_candidates(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.left.cmp(&b.left))
            .then_with(|| a.right.cmp(&b.right))
    });
}

/// Blocking tokens of one entity, prefixed by type so a date never collides
/// with an identifier of the same spelling.
pub fn blocking_tokens(model: &SchemaModel, entity: &Entity, min_token_length: usize) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    let Some(schema) = model.get(&entity.schema) else {
        return tokens;
    };
    for (property, value) in entity.values(schema) {
        if !property.matchable() {
            continue;
        }
        let property_type = &property.property_type;
        let key = property_type.normalize_key(value);
        let prefix = property_type.name();
        if property_type.pivot() {
            if !key.is_empty() {
                tokens.insert(format!("{prefix}:{key}"));
            }
            continue;
        }
        for word in key.split_whitespace() {
            if word.chars().count() >= min_token_length {
                tokens.insert(format!("{prefix}:{word}"));
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn person(id: &str, name: &str, passport: Option<&str>) -> Entity {
        let mut properties = BTreeMap::from([("name".to_string(), vec![name.to_string()])]);
        if let Some(passport) = passport {
            properties.insert("passportNumber".to_string(), vec![passport.to_string()]);
        }
        Entity {
            id: id.to_string(),
            schema: "Person".to_string(),
            properties,
            datasets: BTreeSet::from(["test".to_string()]),
        }
    }

    #[test]
    fn test_tokens_split_names_and_keep_pivots_whole() {
        let model = SchemaModel::default_model().unwrap();
        let tokens = blocking_tokens(&model, &person("a", "Jon Smith", Some("X-123 456")), 2);
        assert!(tokens.contains("name:jon"));
        assert!(tokens.contains("name:smith"));
        assert!(tokens.contains("identifier:X123456"));
    }

    #[test]
    fn test_shared_token_yields_candidate() {
        let model = SchemaModel::default_model().unwrap();
        let tuning = MatchTuning::default();
        let entities = vec![
            person("a", "Jon Smith", Some("X1234567")),
            person("b", "John Smith", Some("X1234567")),
            person("c", "Maria Garcia", None),
        ];
        let index = BlockingIndex::build(&model, entities, &tuning);
        let comparator = Comparator::new(&model, &tuning);
        let candidates = index.candidates(&comparator);
        assert_eq!(candidates.len(), 1);
        assert_eq!((candidates[0].left.as_str(), candidates[0].right.as_str()), ("a", "b"));
    }

    #[test]
    fn test_hot_tokens_are_skipped() {
        let model = SchemaModel::default_model().unwrap();
        let tuning = MatchTuning {
            hot_key_threshold: 2,
            ..MatchTuning::default()
        };
        let entities = vec![
            person("a", "Smith Alpha", None),
            person("b", "Smith Beta", None),
            person("c", "Smith Gamma", None),
        ];
        let index = BlockingIndex::build(&model, entities, &tuning);
        let (pairs, stats) = index.pairs();
        assert!(pairs.is_empty());
        assert_eq!(stats.hot_tokens, 1);
    }

    #[test]
    fn test_candidate_cap_limits_fan_out() {
        let model = SchemaModel::default_model().unwrap();
        let tuning = MatchTuning {
            candidate_cap: 1,
            ..MatchTuning::default()
        };
        let entities = vec![
            person("a", "Smith", None),
            person("b", "Smith", None),
            person("c", "Smith", None),
        ];
        let index = BlockingIndex::build(&model, entities, &tuning);
        let (pairs, stats) = index.pairs();
        assert_eq!(pairs, vec![(0, 1)]);
        assert_eq!(stats.capped, 2);
    }
}
