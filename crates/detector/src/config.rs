//! Detector configuration

use anyhow::Result;
use serde::Deserialize;

/// Detector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Instance name reported in logs and the status API
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics/control
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between statistics epochs
    #[serde(default = "default_data_pickup_period")]
    pub data_pickup_period_secs: u64,

    /// Path to the classifier weights file
    #[serde(default = "default_weights_file")]
    pub weights_file: String,

    /// Whether the detection loop runs at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-switch flow-stats deadline in milliseconds
    #[serde(default = "default_stats_timeout")]
    pub stats_timeout_ms: u64,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "ddos-detector".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_pickup_period() -> u64 {
    3
}

fn default_weights_file() -> String {
    "weights".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_stats_timeout() -> u64 {
    2000
}

impl DetectorConfig {
    /// Load configuration from environment variables prefixed with DETECTOR_
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("DETECTOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| DetectorConfig {
            instance: default_instance(),
            api_port: default_api_port(),
            data_pickup_period_secs: default_data_pickup_period(),
            weights_file: default_weights_file(),
            enabled: default_enabled(),
            stats_timeout_ms: default_stats_timeout(),
        }))
    }
}
