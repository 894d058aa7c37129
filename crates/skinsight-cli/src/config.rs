use anyhow::{Context, Result};
use skinsight_core::{Catalog, EngineConfig};
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Engine TOML file; built-in defaults when unset.
    pub config_path: Option<PathBuf>,
    /// Product catalog TOML; the embedded catalog when unset.
    pub catalog_path: Option<PathBuf>,
    /// JSON model bundle read by `analyze` and written by `train`.
    pub model_path: PathBuf,
    /// Overrides `[synthetic] samples`.
    pub training_samples: Option<usize>,
    /// Overrides the synthetic and forest seeds.
    pub seed: Option<u64>,
}

impl Config {
    /// Load configuration from `SKINSIGHT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("skinsight");

        let model_path = std::env::var("SKINSIGHT_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models.json"));

        Self {
            config_path: std::env::var("SKINSIGHT_CONFIG").ok().map(PathBuf::from),
            catalog_path: std::env::var("SKINSIGHT_CATALOG").ok().map(PathBuf::from),
            model_path,
            training_samples: env_parse("SKINSIGHT_TRAINING_SAMPLES"),
            seed: env_parse("SKINSIGHT_SEED"),
        }
    }

    /// Engine config from file (or defaults) with env overrides applied.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut engine = match &self.config_path {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading engine config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(samples) = self.training_samples {
            engine.synthetic.samples = samples;
        }
        if let Some(seed) = self.seed {
            engine.synthetic.seed = Some(seed);
            engine.skin_type_model.seed = Some(seed);
            engine.condition_model.seed = Some(seed);
        }

        engine
            .validate()
            .context("engine config after environment overrides")?;
        Ok(engine)
    }

    pub fn catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("loading catalog {}", path.display())),
            None => Ok(Catalog::builtin().clone()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
