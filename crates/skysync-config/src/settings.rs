use std::path::Path;

use serde::Deserialize;
use skysync_domain::Speed;

use crate::error::ConfigError;

/// Top-level application settings, loaded from a YAML file. Every section and
/// field has a default, so a missing file or an empty document is a valid
/// configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSettings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub sync: SyncTuning,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSettings {
    /// Postgres connection string; absent means the in-memory store.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_execution_window_mins")]
    pub execution_window_mins: i64,
    #[serde(default = "default_worker_cap")]
    pub worker_cap: usize,
}

fn default_tick_secs() -> u64 {
    60
}

fn default_execution_window_mins() -> i64 {
    5
}

fn default_worker_cap() -> usize {
    8
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            execution_window_mins: default_execution_window_mins(),
            worker_cap: default_worker_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncTuning {
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub default_speed: Speed,
    #[serde(default = "default_refresh_window_hours")]
    pub resource_refresh_window_hours: i64,
}

fn default_max_depth() -> u32 {
    100
}

fn default_refresh_window_hours() -> i64 {
    24
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            default_speed: Speed::Normal,
            resource_refresh_window_hours: default_refresh_window_hours(),
        }
    }
}

/// Load settings from `path`, or the built-in defaults when `path` is `None`.
pub fn load_settings(path: Option<&Path>) -> Result<AppSettings, ConfigError> {
    let Some(path) = path else {
        return Ok(AppSettings::default());
    };
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })
}
