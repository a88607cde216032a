//! Host configuration using Figment
//!
//! Configuration is loaded from:
//! 1. An optional TOML file (base configuration)
//! 2. Environment variables (prefixed with `DAQ_ADAPTER_`)
//!
//! # Example
//! ```no_run
//! use daq_adapters::config::AdapterConfig;
//!
//! let config = AdapterConfig::load_from("adapters.toml")?;
//! println!("Searching {} directories", config.search_paths.len());
//! # Ok::<(), daq_adapters::config::ConfigLoadError>(())
//! ```
//!
//! ```toml
//! search_paths = ["/opt/daq/adapters", "./target/debug"]
//! file_prefix = "daq_adapter_"
//! load_failure_policy = "retry"
//! log_level = "info"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DAQ_ADAPTER_";

/// Errors raised while loading or validating [`AdapterConfig`].
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    /// File or environment could not be parsed.
    #[error("Failed to read adapter configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// Values parsed but are not usable.
    #[error("Invalid adapter configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigLoadError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// What the registry remembers about a module that failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailurePolicy {
    /// Nothing is cached; the next request attempts the load again.
    #[default]
    Retry,
    /// The failure is cached and returned to later requests without touching disk.
    Poison,
}

/// Top-level host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Directories searched, in order, for native adapter modules
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    /// File stem prefix shared by adapter modules
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Registry behaviour after a failed load
    #[serde(default)]
    pub load_failure_policy: LoadFailurePolicy,
    /// Logging level used by the CLI (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_file_prefix() -> String {
    "daq_adapter_".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            file_prefix: default_file_prefix(),
            load_failure_policy: LoadFailurePolicy::default(),
            log_level: default_log_level(),
        }
    }
}

impl AdapterConfig {
    /// Load from environment variables only.
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::extract(Self::base())
    }

    /// Load from a TOML file with environment overrides.
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    /// Example override: `DAQ_ADAPTER_LOAD_FAILURE_POLICY=poison`
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        Self::extract(Self::base().merge(Toml::file(path.as_ref())))
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(AdapterConfig::default()))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigLoadError> {
        let config: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigLoadError::Invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.file_prefix.contains(['/', '\\']) {
            return Err(ConfigLoadError::Invalid(format!(
                "file_prefix '{}' must not contain path separators",
                self.file_prefix
            )));
        }

        Ok(())
    }
}
