use super::{
    cache::CacheConfig, engine::EngineConfig, fitness::FitnessConfig, mutation::MutationConfig,
    storage::StorageConfig, target::TargetConfig, traits::ConfigSection,
};
use crate::error::EngineError;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Prefix for environment overrides, e.g. `POLYEVOLVE_ENGINE__THREADS=4`
pub const ENV_PREFIX: &str = "POLYEVOLVE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub mutation: MutationConfig,
    pub fitness: FitnessConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub target: TargetConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.engine.validate()?;
        self.mutation.validate()?;
        self.fitness.validate()?;
        self.cache.validate()?;
        self.storage.validate()?;
        self.target.validate()?;
        Ok(())
    }
}

/// Shared, validated application configuration.
///
/// Once the engine starts the manager is frozen and further updates are
/// refused; the running engine keeps the snapshot it was built from.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    frozen: Arc<AtomicBool>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AppConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            frozen: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Layer a TOML file and `POLYEVOLVE_*` environment variables over the defaults
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        let source = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
            .build()?;
        let config: AppConfig = source.try_deserialize()?;
        config.validate()?;
        self.replace(config)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn load_from_env(&self) -> Result<(), EngineError> {
        let source = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
            .build()?;
        let config: AppConfig = source.try_deserialize()?;
        config.validate()?;
        self.replace(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let toml_str = toml::to_string_pretty(&self.get())?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `f` to a copy and keep it only if it validates
    pub fn update<F>(&self, f: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut AppConfig),
    {
        if self.is_frozen() {
            return Err(EngineError::FrozenConfiguration);
        }
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }

    pub fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::SeqCst) {
            log::debug!("Configuration frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    fn replace(&self, config: AppConfig) -> Result<(), EngineError> {
        if self.is_frozen() {
            return Err(EngineError::FrozenConfiguration);
        }
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }
}
