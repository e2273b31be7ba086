//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (<config dir>/marketfit/config.toml)
//! 3. Project config (.marketfit/config.toml)
//! 4. Environment variables (MARKETFIT_* prefix, `__` between sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{MarketError, Result};

const ENV_PREFIX: &str = "MARKETFIT_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let global = Self::global_config_path();
        Self::load_layers(global.as_deref(), &Self::project_config_path(), ENV_PREFIX)
    }

    /// Load configuration from a specific file only (defaults + file)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(MarketError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| MarketError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn load_layers(global: Option<&Path>, project: &Path, env_prefix: &str) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // MARKETFIT_WORKFLOW__MAX_ITERATIONS -> workflow.max_iterations
        figment = figment.merge(Env::prefixed(env_prefix).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| MarketError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Platform config directory for marketfit
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "marketfit").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".marketfit")
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write a default config file. Existing files are kept unless `force`.
    pub fn init(global: bool, force: bool) -> Result<PathBuf> {
        let dir = if global {
            Self::global_dir().ok_or_else(|| {
                MarketError::Config("Cannot determine global config directory".to_string())
            })?
        } else {
            Self::project_dir()
        };
        Self::init_in(&dir, force)
    }

    fn init_in(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml()?)?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Render the built-in defaults as a commented TOML file
    fn default_config_toml() -> Result<String> {
        let body = toml::to_string_pretty(&Config::default())
            .map_err(|e| MarketError::Config(e.to_string()))?;
        Ok(format!(
            "# marketfit configuration\n\
             # Environment variables override these values, e.g. MARKETFIT_WORKFLOW__MAX_ITERATIONS=3\n\
             # API keys are read from OPENROUTER_API_KEY / OPENAI_API_KEY, never from this file.\n\n{}",
            body
        ))
    }
}
