use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::errors::CouplingError;
use crate::domain::models::config::Config;

/// Project configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "coupler.yaml";
/// Optional local overrides, merged over [`CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "coupler.local.yaml";
/// Prefix of environment overrides; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "COUPLER_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid {section} section: {source}")]
    InvalidSection {
        section: &'static str,
        #[source]
        source: CouplingError,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. coupler.yaml
    /// 3. coupler.local.yaml (optional overrides)
    /// 4. Environment variables (COUPLER_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_in(".")
    }

    /// Same as [`ConfigLoader::load`], reading the YAML files from `dir`.
    pub fn load_in(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join(CONFIG_FILE)))
            .merge(Yaml::file(dir.join(LOCAL_CONFIG_FILE)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        config
            .equilibrator
            .validate()
            .map_err(|source| ConfigError::InvalidSection {
                section: "equilibrator",
                source,
            })?;
        config
            .evolver
            .validate()
            .map_err(|source| ConfigError::InvalidSection {
                section: "evolver",
                source,
            })?;
        config
            .network
            .validate()
            .map_err(|source| ConfigError::InvalidSection {
                section: "network",
                source,
            })?;

        // Every calibration target must name a parameter the evolver searches
        for target in config.calibration.targets.keys() {
            if !config.evolver.parameters.iter().any(|p| &p.id == target) {
                return Err(ConfigError::ValidationFailed(format!(
                    "calibration target '{target}' is not an evolver parameter"
                )));
            }
        }

        Ok(())
    }
}
