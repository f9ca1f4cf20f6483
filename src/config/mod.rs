//! Unified configuration for unimodel runs.
//!
//! Configuration is loaded with precedence: overrides > Env vars > Config file > Defaults
//!
//! # Example config file (unimodel.toml)
//! ```toml
//! profile = "strict"
//!
//! [schema]
//! taxonomy = "taxonomy/schemata.json"
//!
//! [matching]
//! auto_merge_threshold = 0.9
//!
//! [matching.type_weights]
//! identifier = 4.0
//!
//! [linking.policy]
//! kind = "dataset-priority"
//! datasets = ["registry", "leaks"]
//!
//! [mapping]
//! dataset = "registry"
//! ```
//!
//! Environment variables use the `UNIMODEL_` prefix and `__` between
//! sections, e.g. `UNIMODEL_MATCHING__REVIEW_THRESHOLD=0.5`.

mod defaults;
mod tuning;

pub use defaults::*;
pub use tuning::*;

use crate::linker::CanonicalPolicy;
use crate::types::TypeKind;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniConfig {
    /// Matching tuning profile
    pub profile: Profile,
    pub schema: SchemaConfig,
    /// Per-field overrides on top of the profile
    pub matching: MatchingConfig,
    pub linking: LinkingConfig,
    pub mapping: MappingConfig,
}

impl UniConfig {
    /// Load configuration with precedence: overrides > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - Programmatic overrides to apply on top
    pub fn load(config_path: Option<&str>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(UniConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with UNIMODEL_ prefix
        figment = figment.merge(Env::prefixed("UNIMODEL_").split("__"));

        // Layer 3: overrides
        figment = figment.merge(Serialized::defaults(overrides));

        let config: UniConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment and optional config file only (no overrides)
    pub fn from_env(config_path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }

    /// Profile preset with the `[matching]` overrides applied.
    pub fn match_tuning(&self) -> MatchTuning {
        let mut tuning = MatchTuning::from_profile(self.profile.to_tuning_profile());
        let matching = &self.matching;
        if let Some(value) = matching.auto_merge_threshold {
            tuning.auto_merge_threshold = value;
        }
        if let Some(value) = matching.review_threshold {
            tuning.review_threshold = value;
        }
        if let Some(value) = matching.compare_depth {
            tuning.compare_depth = value;
        }
        if let Some(value) = matching.min_specificity_weight {
            tuning.min_specificity_weight = value;
        }
        if let Some(value) = matching.candidate_cap {
            tuning.candidate_cap = value;
        }
        if let Some(value) = matching.hot_key_threshold {
            tuning.hot_key_threshold = value;
        }
        tuning.type_weights.extend(matching.type_weights.iter().map(|(k, v)| (*k, *v)));
        tuning
    }

    /// Reject threshold combinations that make the decision bands meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tuning = self.match_tuning();
        let unit = 0.0..=1.0;
        for (name, value) in [
            ("auto_merge_threshold", tuning.auto_merge_threshold),
            ("review_threshold", tuning.review_threshold),
            ("min_specificity_weight", tuning.min_specificity_weight),
        ] {
            if !unit.contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        if tuning.review_threshold > tuning.auto_merge_threshold {
            return Err(ConfigError::ThresholdOrder {
                review: tuning.review_threshold,
                auto_merge: tuning.auto_merge_threshold,
            });
        }
        if let Some((kind, weight)) = tuning.type_weights.iter().find(|(_, w)| **w < 0.0) {
            return Err(ConfigError::NegativeWeight {
                kind: *kind,
                weight: *weight,
            });
        }
        Ok(())
    }
}

/// Matching tuning profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    #[default]
    Balanced,
    Strict,
    Lenient,
    BulkLink,
}

impl Profile {
    /// Convert to the internal TuningProfile enum
    pub fn to_tuning_profile(self) -> TuningProfile {
        match self {
            Profile::Balanced => TuningProfile::Balanced,
            Profile::Strict => TuningProfile::Strict,
            Profile::Lenient => TuningProfile::Lenient,
            Profile::BulkLink => TuningProfile::BulkLink,
        }
    }
}

/// Where the schema taxonomy comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// JSON or TOML taxonomy file; the bundled taxonomy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<PathBuf>,
}

/// Overrides of individual [`MatchTuning`] fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_merge_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_specificity_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_cap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_key_threshold: Option<usize>,
    /// Merged over the profile's base weights
    pub type_weights: BTreeMap<TypeKind, f64>,
}

/// Cluster canonicalization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingConfig {
    pub policy: CanonicalPolicy,
}

/// Mapping run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Dataset stamped on emitted statements unless the template names one
    pub dataset: String,
    /// Fixed first-seen stamp; keeps repeated runs byte-identical
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            first_seen: None,
        }
    }
}

/// Programmatic overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching: Option<MatchingOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<MappingOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_merge_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("configuration error: {name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("configuration error: review threshold {review} exceeds auto-merge threshold {auto_merge}")]
    ThresholdOrder { review: f64, auto_merge: f64 },
    #[error("configuration error: weight for {kind} is negative ({weight})")]
    NegativeWeight { kind: TypeKind, weight: f64 },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = UniConfig::default();
        assert_eq!(config.profile, Profile::Balanced);
        assert_eq!(config.mapping.dataset, DEFAULT_DATASET);
        assert_eq!(config.linking.policy, CanonicalPolicy::LowestId);
        let tuning = config.match_tuning();
        assert_eq!(tuning.auto_merge_threshold, DEFAULT_AUTO_MERGE_THRESHOLD);
        assert_eq!(tuning.review_threshold, DEFAULT_REVIEW_THRESHOLD);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profile_serde() {
        let json = serde_json::to_string(&Profile::BulkLink).unwrap();
        assert_eq!(json, "\"bulk-link\"");

        let profile: Profile = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(profile, Profile::Strict);
    }

    #[test]
    fn test_file_and_overrides_layering() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
profile = "strict"

[matching]
review_threshold = 0.5

[matching.type_weights]
identifier = 4.0

[linking.policy]
kind = "dataset-priority"
datasets = ["registry", "leaks"]

[mapping]
dataset = "registry"
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = UniConfig::from_env(Some(&path)).unwrap();
        assert_eq!(config.profile, Profile::Strict);
        assert_eq!(config.mapping.dataset, "registry");
        assert_eq!(
            config.linking.policy,
            CanonicalPolicy::DatasetPriority {
                datasets: vec!["registry".to_string(), "leaks".to_string()]
            }
        );
        let tuning = config.match_tuning();
        assert_eq!(tuning.auto_merge_threshold, 0.92);
        assert_eq!(tuning.review_threshold, 0.5);
        assert_eq!(tuning.weight(TypeKind::Identifier), 4.0);
        assert_eq!(tuning.weight(TypeKind::Name), 1.0);

        let overrides = ConfigOverrides {
            mapping: Some(MappingOverrides {
                dataset: Some("override".to_string()),
                first_seen: None,
            }),
            ..ConfigOverrides::default()
        };
        let config = UniConfig::load(Some(&path), overrides).unwrap();
        assert_eq!(config.mapping.dataset, "override");
    }

    #[test]
    fn test_threshold_order_is_validated() {
        let config = UniConfig {
            matching: MatchingConfig {
                review_threshold: Some(0.95),
                ..MatchingConfig::default()
            },
            ..UniConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));

        let config = UniConfig {
            matching: MatchingConfig {
                auto_merge_threshold: Some(1.5),
                ..MatchingConfig::default()
            },
            ..UniConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));
    }
}
