use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};
use weather_protocol::DEFAULT_PORT;

pub const CONFIG_ENV_VAR: &str = "WEATHER_AGGREGATOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "aggregator.yaml";
/// Upper bound for the sweep period and the staleness deadline.
pub const MAX_SWEEP_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AggregatorConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Maximum readings returned by a query.
    pub snapshot_cap: usize,
    #[serde(with = "humantime_serde")]
    pub sweep_period: Duration,
    /// A station with no contact for this long is evicted.
    #[serde(with = "humantime_serde")]
    pub staleness_deadline: Duration,
    #[serde(with = "humantime_serde")]
    pub body_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("./data"),
            snapshot_cap: 20,
            sweep_period: Duration::from_secs(10),
            staleness_deadline: Duration::from_secs(30),
            body_timeout: Duration::from_secs(10),
            max_body_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} must not exceed one year")]
    TooLong(&'static str),
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_cap == 0 {
            return Err(ConfigError::Zero("snapshot_cap"));
        }
        if self.sweep_period.is_zero() {
            return Err(ConfigError::Zero("sweep_period"));
        }
        if self.staleness_deadline.is_zero() {
            return Err(ConfigError::Zero("staleness_deadline"));
        }
        if self.sweep_period > MAX_SWEEP_DURATION {
            return Err(ConfigError::TooLong("sweep_period"));
        }
        if self.staleness_deadline > MAX_SWEEP_DURATION {
            return Err(ConfigError::TooLong("staleness_deadline"));
        }
        if self.body_timeout.is_zero() {
            return Err(ConfigError::Zero("body_timeout"));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Zero("max_body_bytes"));
        }
        Ok(())
    }
}

/// Path from `--config`, else `WEATHER_AGGREGATOR_CONFIG`, else `aggregator.yaml`.
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Missing, empty or invalid files fall back to defaults.
pub async fn load_config(path: &Path) -> AggregatorConfig {
    if !path.exists() {
        info!(path = ?path, "no config file, using defaults");
        return AggregatorConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!(path = ?path, "unreadable config, using defaults: {}", e);
            return AggregatorConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return AggregatorConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!(path = ?path, "invalid config, using defaults: {}", e);
        AggregatorConfig::default()
    })
}
