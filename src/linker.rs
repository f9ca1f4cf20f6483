//! # Linker Module
//!
//! Turns scored candidates and human judgements into clusters, and clusters
//! into canonical statements.
//!
//! Judgements override scores: a positive judgement merges regardless of
//! score, a negative one forbids the pair and blocks any union that would put
//! both entities into one cluster. Candidates are applied best-first so the
//! outcome does not depend on the order they were produced in.

use crate::compare::MatchCandidate;
use crate::config::MatchTuning;
use crate::dsu::{Clusters, EntityDsu, MergeConflict, MergeResult};
use crate::index::sort_candidates;
use crate::model::Statement;
use crate::store::StatementStore;
use hashbrown::HashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// A human decision about a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    Positive,
    Negative,
    /// Looked at, undecided. Neither merged nor queued for review again.
    Unsure,
}

/// Judgements keyed by unordered entity pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgements {
    pairs: BTreeMap<(String, String), Judgement>,
}

impl Judgements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a judgement, replacing any earlier one for the pair.
    pub fn decide(&mut self, a: &str, b: &str, judgement: Judgement) {
        self.pairs.insert(pair_key(a, b), judgement);
    }

    pub fn get(&self, a: &str, b: &str) -> Option<Judgement> {
        self.pairs.get(&pair_key(a, b)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, Judgement)> {
        self.pairs
            .iter()
            .map(|((a, b), judgement)| (a.as_str(), b.as_str(), *judgement))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// How the surviving id of a cluster is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CanonicalPolicy {
    /// The lexicographically lowest member id.
    #[default]
    LowestId,
    /// The member seen in the earliest listed dataset; unlisted datasets rank
    /// last and ties fall back to the lowest id.
    DatasetPriority { datasets: Vec<String> },
}

impl CanonicalPolicy {
    /// Pick the canonical id among `members`.
    pub fn choose<'m>(&self, members: &'m [String], store: &dyn StatementStore) -> Option<&'m str> {
        match self {
            CanonicalPolicy::LowestId => members.iter().min().map(String::as_str),
            CanonicalPolicy::DatasetPriority { datasets } => members
                .iter()
                .min_by(|a, b| {
                    let rank_a = dataset_rank(datasets, store, a);
                    let rank_b = dataset_rank(datasets, store, b);
                    rank_a.cmp(&rank_b).then_with(|| a.cmp(b))
                })
                .map(String::as_str),
        }
    }
}

fn dataset_rank(priority: &[String], store: &dyn StatementStore, entity_id: &str) -> usize {
    store
        .statements_for(entity_id)
        .iter()
        .filter_map(|statement| priority.iter().position(|d| *d == statement.dataset))
        .min()
        .unwrap_or(priority.len())
}

/// Result of a clustering run.
#[derive(Debug, Clone, Default)]
pub struct LinkOutcome {
    pub clusters: Clusters,
    /// Merges refused because of a negative judgement.
    pub conflicts: Vec<MergeConflict>,
    /// Pairs in the review band with no judgement yet.
    pub review: Vec<MatchCandidate>,
}

/// Seed a union-find with every id and every judgement.
fn seeded<'a, I>(entity_ids: I, judgements: &Judgements, positives: bool) -> (EntityDsu, Vec<MergeConflict>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut dsu = EntityDsu::new();
    for id in entity_ids {
        dsu.add(id);
    }
    for (a, b, judgement) in judgements.iter() {
        if judgement == Judgement::Negative {
            dsu.forbid(a, b);
        }
    }
    let mut conflicts = Vec::new();
    if positives {
        for (a, b, judgement) in judgements.iter() {
            if judgement != Judgement::Positive {
                continue;
            }
            if let MergeResult::Blocked { conflict } = dsu.try_merge(a, b) {
                conflicts.push(conflict);
            }
        }
    }
    (dsu, conflicts)
}

/// Apply sorted candidates to a union-find. Returns blocked merges and
/// unjudged review-band candidates.
fn link_candidates(
    dsu: &mut EntityDsu,
    candidates: &[MatchCandidate],
    judgements: &Judgements,
    tuning: &MatchTuning,
) -> (Vec<MergeConflict>, Vec<MatchCandidate>) {
    let mut conflicts = Vec::new();
    let mut review = Vec::new();
    for candidate in candidates {
        dsu.add(&candidate.left);
        dsu.add(&candidate.right);
        match judgements.get(&candidate.left, &candidate.right) {
            Some(Judgement::Negative | Judgement::Unsure) => continue,
            Some(Judgement::Positive) => {}
            None if candidate.score >= tuning.auto_merge_threshold => {}
            None => {
                if candidate.score >= tuning.review_threshold {
                    review.push(candidate.clone());
                }
                continue;
            }
        }
        if let MergeResult::Blocked { conflict } = dsu.try_merge(&candidate.left, &candidate.right) {
            conflicts.push(conflict);
        }
    }
    (conflicts, review)
}

fn finish(
    mut dsu: EntityDsu,
    mut conflicts: Vec<MergeConflict>,
    mut review: Vec<MatchCandidate>,
) -> LinkOutcome {
    conflicts.sort_by(|a, b| (&a.left, &a.right).cmp(&(&b.left, &b.right)));
    conflicts.dedup();
    sort_candidates(&mut review);
    let clusters = dsu.clusters();
    info!(
        clusters = clusters.len(),
        merged = clusters.merged().count(),
        conflicts = conflicts.len(),
        review = review.len(),
        "clustering complete"
    );
    LinkOutcome {
        clusters,
        conflicts,
        review,
    }
}

/// Cluster entities from a candidate stream on a single union-find.
///
/// `entity_ids` seeds singletons so unmatched entities still get a cluster.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub fn build_clusters<'a, I>(
    entity_ids: I,
    candidates: &[MatchCandidate],
    judgements: &Judgements,
    tuning: &MatchTuning,
) -> LinkOutcome
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ordered = candidates.to_vec();
    sort_candidates(&mut ordered);
    let (mut dsu, mut conflicts) = seeded(entity_ids, judgements, true);
    let (blocked, review) = link_candidates(&mut dsu, &ordered, judgements, tuning);
    conflicts.extend(blocked);
    finish(dsu, conflicts, review)
}

/// Cluster in parallel: chunks of `partition_size` candidates build partial
/// union-finds that are merged in chunk order.
///
/// Without negative judgements the partition equals [`build_clusters`].
#[instrument(skip_all, fields(candidates = candidates.len(), partition_size = tuning.partition_size))]
pub fn build_clusters_partitioned<'a, I>(
    entity_ids: I,
    candidates: &[MatchCandidate],
    judgements: &Judgements,
    tuning: &MatchTuning,
) -> LinkOutcome
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ordered = candidates.to_vec();
    sort_candidates(&mut ordered);

    let partials: Vec<(EntityDsu, Vec<MergeConflict>, Vec<MatchCandidate>)> = ordered
        .par_chunks(tuning.partition_size.max(1))
        .map(|chunk| {
            let (mut dsu, _) = seeded(std::iter::empty(), judgements, false);
            let (conflicts, review) = link_candidates(&mut dsu, chunk, judgements, tuning);
            (dsu, conflicts, review)
        })
        .collect();
    debug!(partitions = partials.len(), "merging partial union-finds");

    let (mut dsu, mut conflicts) = seeded(entity_ids, judgements, true);
    let mut review = Vec::new();
    for (partial, partial_conflicts, partial_review) in partials {
        conflicts.extend(partial_conflicts);
        conflicts.extend(dsu.merge_from(&partial));
        review.extend(partial_review);
    }
    finish(dsu, conflicts, review)
}

/// Member id to canonical id for every merged cluster.
pub fn canonical_ids(
    clusters: &Clusters,
    store: &dyn StatementStore,
    policy: &CanonicalPolicy,
) -> BTreeMap<String, String> {
    let mut mapping = BTreeMap::new();
    for cluster in clusters.merged() {
        let Some(canonical) = policy.choose(&cluster.members, store) else {
            continue;
        };
        for member in &cluster.members {
            mapping.insert(member.clone(), canonical.to_string());
        }
    }
    mapping
}

/// Every live statement, with members of merged clusters re-asserted under
/// their canonical id. Output follows store order; statements that become
/// identical after re-assertion are emitted once.
///
/// Disagreements are carried over as they are: when two members assert
/// different values for a single-valued property in the same dataset, both
/// statements are re-asserted under the canonical id. Loading the output into
/// a [`StatementStore`] rejects the later one with
/// [`crate::error::StoreError::SingleValueCollision`], so the caller decides
/// which to keep (or uses `supersede`).
#[instrument(skip_all, fields(clusters = clusters.len()))]
pub fn canonicalize(
    store: &dyn StatementStore,
    clusters: &Clusters,
    policy: &CanonicalPolicy,
) -> Vec<Statement> {
    let mapping = canonical_ids(clusters, store, policy);
    let mut seen: HashSet<String> = HashSet::new();
    let mut output = Vec::with_capacity(store.len());
    for statement in store.statements() {
        let statement = match mapping.get(&statement.entity_id) {
            Some(canonical) => statement.reassert(canonical),
            None => statement.clone(),
        };
        if seen.insert(statement.id.clone()) {
            output.push(statement);
        }
    }
    debug!(
        rewritten = mapping.len(),
        statements = output.len(),
        "canonicalized statements"
    );
    output
}
