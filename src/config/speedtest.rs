//! Topic and measurement settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Where results and discovery descriptors are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TopicsConfig {
    /// State topic for the result payload.
    #[validate(length(min = 1, message = "Base topic must not be empty"))]
    pub base_topic: String,

    /// Home Assistant discovery prefix. Empty disables discovery.
    pub discovery_root: String,

    /// Prefix for the three sensor names.
    #[validate(length(min = 1, message = "Sensor name must not be empty"))]
    pub sensor_name: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        TopicsConfig {
            base_topic: "speedtest".to_string(),
            discovery_root: "homeassistant".to_string(),
            sensor_name: "speedtest".to_string(),
        }
    }
}

impl TopicsConfig {
    pub fn discovery_enabled(&self) -> bool {
        !self.discovery_root.is_empty()
    }
}

/// Endpoint selection and transfer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SpeedtestConfig {
    /// Only these server ids are eligible. Empty means any server.
    pub server_ids: Vec<u32>,

    /// Run download and upload over concurrent connections.
    pub multi_connection: bool,

    /// Per-request HTTP timeout in seconds.
    #[validate(range(
        min = 1,
        max = 600,
        message = "Timeout must be between 1 and 600 seconds"
    ))]
    pub timeout_secs: u64,

    /// How many candidates to request from the directory.
    #[validate(range(min = 1, max = 100, message = "Server limit must be between 1 and 100"))]
    pub server_limit: usize,
}

impl Default for SpeedtestConfig {
    fn default() -> Self {
        SpeedtestConfig {
            server_ids: Vec::new(),
            multi_connection: false,
            timeout_secs: 60,
            server_limit: 10,
        }
    }
}
