//! # Disjoint Set Union (DSU) with Judgement Guards
//!
//! Union-find over entity ids. Ids are interned to dense `u32` indices so the
//! parent and rank tables are plain vectors. Negative judgements ("these two
//! are not the same") are recorded per cluster root and block any union that
//! would put a judged-distinct pair into one cluster.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense cluster identifier, assigned in cluster order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// The judged-distinct pair that blocked a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub left: String,
    pub right: String,
}

/// Result of attempting to merge two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeResult {
    /// Two clusters became one
    Merged,
    /// Both entities were already in the same cluster
    AlreadyJoined,
    /// A negative judgement between members of the two clusters forbids the merge
    Blocked { conflict: MergeConflict },
}

impl MergeResult {
    pub fn is_blocked(&self) -> bool {
        matches!(self, MergeResult::Blocked { .. })
    }
}

/// Union-find over entity ids.
#[derive(Debug, Clone, Default)]
pub struct EntityDsu {
    ids: Vec<String>,
    index: FxHashMap<String, u32>,
    parent: Vec<u32>,
    rank: Vec<u8>,
    /// Members of each root.
    members: FxHashMap<u32, Vec<u32>>,
    /// Per root: every entity some member was judged distinct from.
    forbidden: FxHashMap<u32, FxHashSet<u32>>,
    /// Per entity: the entities it was judged distinct from.
    judged: FxHashMap<u32, FxHashSet<u32>>,
    cluster_count: usize,
}

impl EntityDsu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an entity id, adding it as a singleton cluster if new.
    pub fn add(&mut self, id: &str) -> u32 {
        if let Some(&index) = self.index.get(id) {
            return index;
        }
        let index = self.ids.len() as u32;
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), index);
        self.parent.push(index);
        self.rank.push(0);
        self.members.insert(index, vec![index]);
        self.cluster_count += 1;
        index
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of entities tracked.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Root lookup with path halving.
    fn find_index(&mut self, mut node: u32) -> u32 {
        loop {
            let parent = self.parent[node as usize];
            if parent == node {
                return node;
            }
            let grandparent = self.parent[parent as usize];
            self.parent[node as usize] = grandparent;
            node = grandparent;
        }
    }

    /// Root lookup without compression.
    fn root_of(&self, mut node: u32) -> u32 {
        while self.parent[node as usize] != node {
            node = self.parent[node as usize];
        }
        node
    }

    /// Representative id of `id`'s cluster, or `None` if untracked.
    pub fn find(&mut self, id: &str) -> Option<&str> {
        let index = *self.index.get(id)?;
        let root = self.find_index(index);
        Some(self.ids[root as usize].as_str())
    }

    pub fn same_cluster(&mut self, a: &str, b: &str) -> bool {
        match (self.index.get(a).copied(), self.index.get(b).copied()) {
            (Some(a), Some(b)) => self.find_index(a) == self.find_index(b),
            _ => a == b,
        }
    }

    /// Record that `a` and `b` must never share a cluster.
    ///
    /// Returns `false` if they already do; the judgement then only guards
    /// future unions.
    pub fn forbid(&mut self, a: &str, b: &str) -> bool {
        let a = self.add(a);
        let b = self.add(b);
        let root_a = self.find_index(a);
        let root_b = self.find_index(b);
        self.forbidden.entry(root_a).or_default().insert(b);
        self.forbidden.entry(root_b).or_default().insert(a);
        self.judged.entry(a).or_default().insert(b);
        self.judged.entry(b).or_default().insert(a);
        root_a != root_b
    }

    fn blocking_pair(&self, root_a: u32, root_b: u32) -> Option<(u32, u32)> {
        let members_b = self.members.get(&root_b)?;
        let forbidden_a = self.forbidden.get(&root_a)?;
        let blocked = members_b.iter().copied().find(|m| forbidden_a.contains(m))?;
        // Name the member of `a` that carries the judgement.
        let judged = self
            .members
            .get(&root_a)?
            .iter()
            .copied()
            .find(|member| {
                self.judged
                    .get(member)
                    .is_some_and(|set| set.contains(&blocked))
            })
            .unwrap_or(root_a);
        Some((judged, blocked))
    }

    /// Attempt to merge the clusters of `a` and `b`.
    pub fn try_merge(&mut self, a: &str, b: &str) -> MergeResult {
        let a = self.add(a);
        let b = self.add(b);
        self.try_merge_index(a, b)
    }

    fn try_merge_index(&mut self, a: u32, b: u32) -> MergeResult {
        let root_a = self.find_index(a);
        let root_b = self.find_index(b);
        if root_a == root_b {
            return MergeResult::AlreadyJoined;
        }
        if let Some((left, right)) = self.blocking_pair(root_a, root_b) {
            return MergeResult::Blocked {
                conflict: MergeConflict {
                    left: self.ids[left as usize].clone(),
                    right: self.ids[right as usize].clone(),
                },
            };
        }
        self.union(root_a, root_b);
        MergeResult::Merged
    }

    /// Union two roots by rank, carrying member lists and judgements along.
    fn union(&mut self, root_a: u32, root_b: u32) {
        let (child, root) = match self.rank[root_a as usize].cmp(&self.rank[root_b as usize]) {
            std::cmp::Ordering::Less => (root_a, root_b),
            std::cmp::Ordering::Greater => (root_b, root_a),
            std::cmp::Ordering::Equal => {
                self.rank[root_b as usize] = self.rank[root_b as usize].saturating_add(1);
                (root_a, root_b)
            }
        };
        self.parent[child as usize] = root;

        if let Some(moved) = self.members.remove(&child) {
            self.members.entry(root).or_default().extend(moved);
        }
        if let Some(moved) = self.forbidden.remove(&child) {
            self.forbidden.entry(root).or_default().extend(moved);
        }
        self.cluster_count = self.cluster_count.saturating_sub(1);
    }

    /// Fold another union-find into this one. Judgements of `other` are
    /// applied first; unions that they (or this DSU's judgements) forbid are
    /// returned as conflicts.
    pub fn merge_from(&mut self, other: &EntityDsu) -> Vec<MergeConflict> {
        for (&member, targets) in &other.judged {
            for &target in targets {
                self.forbid(&other.ids[member as usize], &other.ids[target as usize]);
            }
        }

        let mut conflicts = Vec::new();
        for (index, id) in other.ids.iter().enumerate() {
            let local = self.add(id);
            let root = other.root_of(index as u32);
            if root as usize == index {
                continue;
            }
            let representative = self.add(&other.ids[root as usize]);
            if let MergeResult::Blocked { conflict } = self.try_merge_index(local, representative) {
                conflicts.push(conflict);
            }
        }
        conflicts
    }

    /// Materialize clusters: members sorted, clusters ordered by first member.
    pub fn clusters(&mut self) -> Clusters {
        let mut groups: FxHashMap<u32, Vec<String>> = FxHashMap::default();
        for index in 0..self.ids.len() as u32 {
            let root = self.find_index(index);
            groups
                .entry(root)
                .or_default()
                .push(self.ids[index as usize].clone());
        }

        let mut groups: Vec<Vec<String>> = groups.into_values().collect();
        for members in &mut groups {
            members.sort();
        }
        groups.sort();

        Clusters {
            clusters: groups
                .into_iter()
                .enumerate()
                .map(|(position, members)| Cluster {
                    id: ClusterId(position as u32),
                    members,
                })
                .collect(),
        }
    }
}

/// One cluster of entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    /// Sorted member ids
    pub members: Vec<String>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.binary_search_by(|member| member.as_str().cmp(id)).is_ok()
    }
}

/// Partition of entity ids into clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clusters {
    /// All clusters
    pub clusters: Vec<Cluster>,
}

impl Clusters {
    /// Create a new clusters collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cluster by ID
    pub fn get_cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0 as usize).filter(|c| c.id == id)
    }

    /// The cluster containing an entity
    pub fn cluster_of(&self, entity_id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|cluster| cluster.contains(entity_id))
    }

    /// Clusters with more than one member
    pub fn merged(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|cluster| cluster.len() > 1)
    }

    /// Get the number of clusters
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Check if there are no clusters
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}
