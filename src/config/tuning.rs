use super::defaults::*;
use crate::types::TypeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Knobs of the comparison and clustering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTuning {
    pub auto_merge_threshold: f64,
    pub review_threshold: f64,
    pub compare_depth: usize,
    pub min_specificity_weight: f64,
    pub type_weights: BTreeMap<TypeKind, f64>,
    pub candidate_cap: usize,
    pub hot_key_threshold: usize,
    pub min_token_length: usize,
    pub partition_size: usize,
}

/// Preset profiles that bundle common tuning choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningProfile {
    Balanced,
    /// Fewer automatic merges, wider review band.
    Strict,
    /// More automatic merges.
    Lenient,
    /// Large linking runs: tighter blocking, bigger partitions.
    BulkLink,
}

impl Default for MatchTuning {
    fn default() -> Self {
        Self {
            auto_merge_threshold: DEFAULT_AUTO_MERGE_THRESHOLD,
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            compare_depth: DEFAULT_COMPARE_DEPTH,
            min_specificity_weight: DEFAULT_MIN_SPECIFICITY_WEIGHT,
            type_weights: default_type_weights(),
            candidate_cap: DEFAULT_CANDIDATE_CAP,
            hot_key_threshold: DEFAULT_HOT_KEY_THRESHOLD,
            min_token_length: DEFAULT_MIN_TOKEN_LENGTH,
            partition_size: DEFAULT_PARTITION_SIZE,
        }
    }
}

impl MatchTuning {
    pub fn from_profile(profile: TuningProfile) -> Self {
        match profile {
            TuningProfile::Balanced => Self::balanced(),
            TuningProfile::Strict => Self::strict(),
            TuningProfile::Lenient => Self::lenient(),
            TuningProfile::BulkLink => Self::bulk_link(),
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            auto_merge_threshold: 0.92,
            review_threshold: 0.55,
            ..Self::default()
        }
    }

    pub fn lenient() -> Self {
        Self {
            auto_merge_threshold: 0.78,
            review_threshold: 0.5,
            ..Self::default()
        }
    }

    pub fn bulk_link() -> Self {
        Self {
            compare_depth: 0,
            candidate_cap: 500,
            hot_key_threshold: 1_000,
            min_token_length: 3,
            partition_size: 50_000,
            ..Self::default()
        }
    }

    /// Base weight of a property type.
    pub fn weight(&self, kind: TypeKind) -> f64 {
        self.type_weights
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_TYPE_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_keep_threshold_order() {
        for profile in [
            TuningProfile::Balanced,
            TuningProfile::Strict,
            TuningProfile::Lenient,
            TuningProfile::BulkLink,
        ] {
            let tuning = MatchTuning::from_profile(profile);
            assert!(tuning.review_threshold < tuning.auto_merge_threshold);
        }
    }

    #[test]
    fn test_identifier_outweighs_name() {
        let tuning = MatchTuning::default();
        assert!(tuning.weight(TypeKind::Identifier) > tuning.weight(TypeKind::Name));
        assert!(tuning.weight(TypeKind::Name) > tuning.weight(TypeKind::Text));
    }
}
