//! Configuration management for Floodgate.

use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};
use crate::ratelimit::presets;
use crate::ratelimit::LimiterConfig;

/// Prefix of environment variable overrides, e.g. `FLOODGATE__SERVER__LISTEN_ADDR`.
pub const ENV_PREFIX: &str = "FLOODGATE";

/// Main configuration for the Floodgate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Limiters by name
    #[serde(default = "default_limiters")]
    pub limiters: BTreeMap<String, LimiterSettings>,
}

impl Default for FloodgateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limiters: default_limiters(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Decision service listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Seconds between sweeps of expired windows
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ServerConfig {
    /// The sweep cadence as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn default_sweep_interval() -> u64 {
    60
}

/// Settings of one limiter as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Requests admitted per window and client
    pub max_requests: u64,
    /// Message returned with rejections
    pub message: String,
}

impl From<&LimiterConfig> for LimiterSettings {
    fn from(config: &LimiterConfig) -> Self {
        Self {
            window_ms: config.window_size().as_millis() as u64,
            max_requests: config.max_requests(),
            message: config.rejection_message().to_string(),
        }
    }
}

impl TryFrom<&LimiterSettings> for LimiterConfig {
    type Error = FloodgateError;

    fn try_from(settings: &LimiterSettings) -> Result<Self> {
        LimiterConfig::new(
            Duration::from_millis(settings.window_ms),
            settings.max_requests,
            settings.message.clone(),
        )
    }
}

impl LimiterSettings {
    /// Validate into a limiter configuration, naming `name` in errors.
    pub fn to_limiter_config(&self, name: &str) -> Result<LimiterConfig> {
        LimiterConfig::try_from(self).map_err(|e| match e {
            FloodgateError::InvalidConfig(reason) => {
                FloodgateError::InvalidConfig(format!("limiter '{}': {}", name, reason))
            }
            other => other,
        })
    }
}

fn default_limiters() -> BTreeMap<String, LimiterSettings> {
    BTreeMap::from([
        (
            presets::GENERAL.to_string(),
            LimiterSettings::from(&LimiterConfig::general()),
        ),
        (
            presets::AUTH.to_string(),
            LimiterSettings::from(&LimiterConfig::auth()),
        ),
    ])
}

impl FloodgateConfig {
    /// Load configuration from an optional YAML file, then apply
    /// `FLOODGATE__*` environment overrides.
    ///
    /// A `limiters` section in the file replaces the default limiters.
    /// Environment overrides are merged field by field, so
    /// `FLOODGATE__LIMITERS__AUTH__MAX_REQUESTS=10` keeps every other limiter
    /// and every other field of `auth`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let defaults = config::Config::try_from(&FloodgateConfig::default())?;
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                let file = config::Config::builder()
                    .add_source(File::from(path))
                    .build()?;

                if file.get_table("limiters").is_err() {
                    builder = builder.add_source(defaults);
                }
                builder = builder.add_source(file);
            }
            None => builder = builder.add_source(defaults),
        }

        let settings = builder.add_source(env).build()?;

        let config: FloodgateConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FloodgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.server.sweep_interval_secs == 0 {
            return Err(FloodgateError::Config(
                "sweep interval must be greater than 0".to_string(),
            ));
        }

        if self.limiters.is_empty() {
            return Err(FloodgateError::Config(
                "at least one limiter must be configured".to_string(),
            ));
        }

        for (name, settings) in &self.limiters {
            if name.is_empty() {
                return Err(FloodgateError::Config(
                    "limiter names must not be empty".to_string(),
                ));
            }

            settings.to_limiter_config(name)?;
        }

        Ok(())
    }
}
