use super::{
    evolution::EvolutionConfig, search_space::SearchSpaceConfig, strategies::StrategyConfig,
    traits::ConfigSection,
};
use crate::error::{ClanTuneError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Prefix for environment overrides, e.g. `CLANTUNE__EVOLUTION__SEED=7`.
pub const ENV_PREFIX: &str = "CLANTUNE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub strategies: StrategyConfig,
    pub search_space: SearchSpaceConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.strategies.validate()?;
        self.search_space.validate()?;
        Ok(())
    }
}

fn load(file: Option<&Path>) -> Result<AppConfig> {
    let mut builder = ::config::Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(::config::File::from(path));
    }
    let settings = builder
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ClanTuneError::Configuration(format!("Failed to read config: {}", e)))?;

    settings
        .try_deserialize()
        .map_err(|e| ClanTuneError::Configuration(format!("Failed to parse config: {}", e)))
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load a TOML (or JSON) file, then apply environment overrides.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = load(Some(path.as_ref()))?;
        self.replace(config)
    }

    /// Defaults with environment overrides only.
    pub fn load_from_env(&self) -> Result<()> {
        let config = load(None)?;
        self.replace(config)
    }

    fn replace(&self, config: AppConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| ClanTuneError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| ClanTuneError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply an edit; it is rolled back when the result fails validation.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut edited = config.clone();
        f(&mut edited);
        edited.validate()?;
        *config = edited;
        Ok(())
    }
}
