use super::{
    evaluator::EvaluatorConfig,
    operators::OperatorConfig,
    semantics::SemanticsConfig,
    traits::ConfigSection,
};
use crate::error::TreegraftError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

pub const ENV_PREFIX: &str = "TREEGRAFT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub operators: OperatorConfig,
    pub semantics: SemanticsConfig,
    pub evaluator: EvaluatorConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), TreegraftError> {
        validate_section(&self.operators)?;
        validate_section(&self.semantics)?;
        validate_section(&self.evaluator)?;
        Ok(())
    }
}

/// Prefixes configuration errors with the section they came from.
fn validate_section<S: ConfigSection>(section: &S) -> Result<(), TreegraftError> {
    section.validate().map_err(|e| match e {
        TreegraftError::Configuration(message) => {
            TreegraftError::Configuration(format!("[{}] {}", S::section_name(), message))
        }
        other => other,
    })
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TreegraftError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TreegraftError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| TreegraftError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    /// Loads an optional file (toml or json, by extension) overlaid with
    /// `TREEGRAFT_<SECTION>__<FIELD>` environment variables.
    pub fn load_layered(&self, path: Option<&Path>) -> Result<(), TreegraftError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TreegraftError::Configuration(format!("Failed to load config: {}", e)))?;

        config.validate()?;
        log::debug!("Loaded layered configuration: {:?}", config.operators);

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TreegraftError> {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        let toml_str = toml::to_string_pretty(&*config)
            .map_err(|e| TreegraftError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| TreegraftError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Applies `f` and keeps the result only if it validates.
    pub fn update<F>(&self, f: F) -> Result<(), TreegraftError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
