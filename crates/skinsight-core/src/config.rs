//! Engine configuration, loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid config.

use crate::classifier::ForestParams;
use crate::recommender::RecommenderConfig;
use crate::synthetic::DEFAULT_SAMPLE_COUNT;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Synthetic training-set settings used by `auto_train`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub samples: usize,
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLE_COUNT,
            seed: Some(42),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recommender: RecommenderConfig,
    #[serde(deserialize_with = "skin_type_params")]
    pub skin_type_model: ForestParams,
    #[serde(deserialize_with = "condition_params")]
    pub condition_model: ForestParams,
    pub synthetic: SyntheticConfig,
}

/// Forest fields present in a model section. Absent fields keep the
/// model's own defaults rather than the generic forest defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ForestOverrides {
    trees: Option<usize>,
    max_depth: Option<usize>,
    min_samples_split: Option<usize>,
    min_samples_leaf: Option<usize>,
    max_features: Option<usize>,
    seed: Option<u64>,
    validation_fraction: Option<f64>,
    min_samples_per_class: Option<usize>,
}

impl ForestOverrides {
    fn apply(self, base: ForestParams) -> ForestParams {
        ForestParams {
            trees: self.trees.unwrap_or(base.trees),
            max_depth: self.max_depth.unwrap_or(base.max_depth),
            min_samples_split: self.min_samples_split.unwrap_or(base.min_samples_split),
            min_samples_leaf: self.min_samples_leaf.unwrap_or(base.min_samples_leaf),
            max_features: self.max_features.or(base.max_features),
            seed: self.seed.or(base.seed),
            validation_fraction: self.validation_fraction.unwrap_or(base.validation_fraction),
            min_samples_per_class: self.min_samples_per_class.unwrap_or(base.min_samples_per_class),
        }
    }
}

fn skin_type_params<'de, D: Deserializer<'de>>(d: D) -> Result<ForestParams, D::Error> {
    ForestOverrides::deserialize(d).map(|o| o.apply(ForestParams::default()))
}

fn condition_params<'de, D: Deserializer<'de>>(d: D) -> Result<ForestParams, D::Error> {
    ForestOverrides::deserialize(d).map(|o| o.apply(ForestParams::condition()))
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recommender: RecommenderConfig::default(),
            skin_type_model: ForestParams::default(),
            condition_model: ForestParams::condition(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&src)?;
        tracing::info!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.recommender;
        let w = &r.weights;
        for (name, value) in [
            ("concern", w.concern),
            ("budget", w.budget),
            ("age", w.age),
            ("rating", w.rating),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("weight {name} = {value}")));
            }
        }
        if (w.total() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::Invalid(format!(
                "recommender weights sum to {}, expected 1.0",
                w.total()
            )));
        }
        if !r.budget_tolerance.is_finite() || r.budget_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "budget_tolerance = {}",
                r.budget_tolerance
            )));
        }
        if r.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }

        for (name, params) in [
            ("skin_type_model", &self.skin_type_model),
            ("condition_model", &self.condition_model),
        ] {
            if params.trees == 0 || params.max_depth == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}: trees and max_depth must be at least 1"
                )));
            }
            if params.min_samples_leaf == 0 || params.min_samples_per_class == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}: min_samples_leaf and min_samples_per_class must be at least 1"
                )));
            }
            if params.max_features == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}: max_features must be at least 1"
                )));
            }
            if !(0.0..1.0).contains(&params.validation_fraction) {
                return Err(ConfigError::Invalid(format!(
                    "{name}: validation_fraction = {}",
                    params.validation_fraction
                )));
            }
        }
        Ok(())
    }
}
