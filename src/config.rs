//! Configuration loading.
//!
//! Settings come from a configuration file (JSON, TOML or YAML, chosen by
//! extension) layered with environment variables prefixed `GATEWAY_CHECK`,
//! using `__` between nested keys:
//!
//! ```text
//! GATEWAY_CHECK__INFLUXDB__PASSWORD=secret
//! GATEWAY_CHECK__CHECK__CONCURRENCY=8
//! ```
//!
//! A missing file, unparseable content, missing keys or invalid values are
//! all fatal: the binary reports the [`ConfigError`] and exits. Values are
//! checked by [`Settings::validate`] once command-line overrides are applied.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use gateway_check_adapters::noc::DEFAULT_NOC_ENDPOINT;
use gateway_check_types::DEFAULT_FRESHNESS_WINDOW;
use serde::Deserialize;
use thiserror::Error;

use crate::duration;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "GATEWAY_CHECK";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONCURRENCY: usize = 4;

/// Errors raised while loading configuration. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file was not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load configuration from {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub influxdb: InfluxSettings,
    #[serde(default)]
    pub noc: NocSettings,
    #[serde(default)]
    pub check: CheckSettings,
}

/// Time-series store connection. Every key except `ssl` and `timeout` is required.
#[derive(Clone, Deserialize)]
pub struct InfluxSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_timeout", deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

impl std::fmt::Debug for InfluxSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl", &self.ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Remote lookup service.
#[derive(Debug, Clone, Deserialize)]
pub struct NocSettings {
    #[serde(default = "default_noc_endpoint")]
    pub base_url: String,
    #[serde(default = "default_timeout", deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

impl Default for NocSettings {
    fn default() -> Self {
        Self {
            base_url: default_noc_endpoint(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How a pass over the inventory is run.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSettings {
    #[serde(
        default = "default_freshness_window",
        deserialize_with = "duration::deserialize"
    )]
    pub freshness_window: Duration,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub deadline: Option<Duration>,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_noc_endpoint() -> String {
    DEFAULT_NOC_ENDPOINT.to_string()
}

fn default_freshness_window() -> Duration {
    DEFAULT_FRESHNESS_WINDOW
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Settings {
    /// Load settings from `path` and apply environment overrides.
    ///
    /// Values are not validated here; call [`Settings::validate`] after any
    /// further overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    fn load_with_env(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        Config::builder()
            .add_source(File::from(path))
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|source| ConfigError::Load {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Check values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.influxdb.host.trim().is_empty() {
            return Err(ConfigError::Invalid("influxdb.host must not be empty".into()));
        }
        if self.influxdb.port == 0 {
            return Err(ConfigError::Invalid("influxdb.port must not be 0".into()));
        }
        if self.influxdb.database.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "influxdb.database must not be empty".into(),
            ));
        }
        if self.noc.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("noc.base_url must not be empty".into()));
        }
        if self.check.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "check.concurrency must be at least 1".into(),
            ));
        }
        if self.influxdb.timeout.is_zero() || self.noc.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        Ok(())
    }
}
