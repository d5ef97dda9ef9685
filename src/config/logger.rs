//! Logging configuration structures and validation logic.
//!
//! These types describe how the console subscriber is built. They are
//! resolved from `MQTT_LOG_*` variables and validated with `validator`
//! before `LoggerManager` installs anything.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Available formats for console log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    #[default]
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "pretty")]
    Pretty,
    #[serde(rename = "json")]
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "unknown log format '{other}', expected compact, pretty or json"
            )),
        }
    }
}

/// Top-level logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggerConfig {
    /// Global log level. Valid values: trace, debug, info, warn, error (case-insensitive).
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,

    #[validate(nested)]
    pub console: ConsoleConfig,
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates that the provided log level is one of the supported values.
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LoggerConfig::is_known_level(level) {
        return Ok(());
    }
    let mut err = ValidationError::new("invalid_log_level");
    err.message = Some(format!("Invalid log level: {}", level).into());
    Err(err)
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "info".to_string(),
            console: ConsoleConfig::default(),
        }
    }
}

impl LoggerConfig {
    pub fn is_known_level(level: &str) -> bool {
        LEVELS.contains(&level.to_lowercase().as_str())
    }

    /// Level directive understood by `EnvFilter`.
    pub fn filter_directive(&self) -> String {
        self.level.to_lowercase()
    }
}

/// Configuration for console log output.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Enable ANSI color codes in console output.
    pub ansi_colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            format: LogFormat::default(),
            ansi_colors: true,
        }
    }
}
