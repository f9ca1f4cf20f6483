//! Default constants for unimodel configuration.
//!
//! All magic numbers are centralized here with documentation.

use crate::types::TypeKind;
use std::collections::BTreeMap;

// =============================================================================
// Decision Thresholds
// =============================================================================

/// Score at or above which a pair is an auto-merge candidate.
pub const DEFAULT_AUTO_MERGE_THRESHOLD: f64 = 0.85;

/// Score at or above which a pair is queued for human review.
pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.6;

// =============================================================================
// Scoring
// =============================================================================

/// How deep entity-typed properties recurse into referenced entities.
/// At depth 0 references compare by id only.
pub const DEFAULT_COMPARE_DEPTH: usize = 1;

/// Floor for the specificity factor of a compared property.
/// Keeps short but exact matches (two-letter country codes) from weighing nothing.
pub const DEFAULT_MIN_SPECIFICITY_WEIGHT: f64 = 0.1;

/// Per-type base weights. Identity-bearing types dominate, free text barely counts.
pub fn default_type_weights() -> BTreeMap<TypeKind, f64> {
    BTreeMap::from([
        (TypeKind::Identifier, 3.0),
        (TypeKind::Iban, 3.0),
        (TypeKind::Checksum, 3.0),
        (TypeKind::Email, 2.5),
        (TypeKind::Phone, 2.0),
        (TypeKind::Entity, 1.5),
        (TypeKind::Url, 1.5),
        (TypeKind::Date, 1.5),
        (TypeKind::Name, 1.0),
        (TypeKind::Address, 1.0),
        (TypeKind::Number, 0.5),
        (TypeKind::String, 0.5),
        (TypeKind::Country, 0.3),
        (TypeKind::Language, 0.2),
        (TypeKind::Text, 0.2),
    ])
}

/// Weight for a type missing from the configured table.
pub const DEFAULT_TYPE_WEIGHT: f64 = 0.5;

// =============================================================================
// Blocking
// =============================================================================

/// Maximum candidates generated per entity.
pub const DEFAULT_CANDIDATE_CAP: usize = 2000;

/// Blocking tokens shared by more entities than this are skipped.
/// Common tokens ("ltd", "john") would otherwise produce quadratic fan-out.
pub const DEFAULT_HOT_KEY_THRESHOLD: usize = 5_000;

/// Shortest name token used for blocking.
pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 2;

// =============================================================================
// Clustering
// =============================================================================

/// Candidates per chunk when clustering with partial union-finds.
pub const DEFAULT_PARTITION_SIZE: usize = 10_000;

/// Default number of partitions when not specified
/// Uses number of CPU cores for optimal parallelism.
pub fn default_partition_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

// =============================================================================
// Mapping
// =============================================================================

/// Dataset name stamped on statements when a mapping does not declare one.
pub const DEFAULT_DATASET: &str = "default";
