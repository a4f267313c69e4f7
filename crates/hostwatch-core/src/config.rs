//! Configuration management for the hostwatch registry.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`HOSTWATCH_REGISTRY__` prefix)
//! 2. Config file (`hostwatch.toml`, `[registry]` section)
//! 3. Defaults

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{HostwatchError, Result};

/// Liveness assigned on first sighting and the ceiling for re-sightings.
pub const DEFAULT_MAX_LIVENESS: u8 = 10;

/// Environment variable consulted for the alias file when the config has none.
pub const ALIAS_PATH_ENV: &str = "HOSTWATCH_ALIASES";

/// Registry and sweep configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Consecutive missed sweeps before an endpoint is evicted.
    #[serde(default = "default_max_liveness")]
    pub max_liveness: u8,

    /// Interval between discovery sweeps in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Alias overlay file. Falls back to `$HOSTWATCH_ALIASES`, then
    /// `$HOME/.hostwatch/aliases.json`.
    #[serde(default)]
    pub alias_file: Option<PathBuf>,
}

fn default_max_liveness() -> u8 {
    DEFAULT_MAX_LIVENESS
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_liveness: default_max_liveness(),
            sweep_interval_ms: default_sweep_interval_ms(),
            alias_file: None,
        }
    }
}

impl RegistryConfig {
    /// Load from `<file_prefix>.toml` and `HOSTWATCH_REGISTRY__*` variables.
    ///
    /// A missing file or a missing `[registry]` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("HOSTWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| HostwatchError::Config(e.to_string()))?;

        let loaded = match cfg.get::<RegistryConfig>("registry") {
            Ok(c) => c,
            Err(config::ConfigError::NotFound(_)) => {
                tracing::debug!(file_prefix, "No [registry] config found, using defaults");
                RegistryConfig::default()
            }
            Err(e) => return Err(HostwatchError::Config(e.to_string())),
        };
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_liveness == 0 {
            return Err(HostwatchError::Config(
                "max_liveness must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(HostwatchError::Config(
                "sweep_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Where the alias overlay lives for this run.
    pub fn alias_path(&self) -> PathBuf {
        if let Some(path) = &self.alias_file {
            return path.clone();
        }
        match std::env::var(ALIAS_PATH_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => match std::env::var_os("HOME") {
                Some(home) => PathBuf::from(home).join(".hostwatch").join("aliases.json"),
                None => PathBuf::from("aliases.json"),
            },
        }
    }
}
