//! Application configuration loading, validation, and management.
//!
//! The top-level `Config` aggregates logging, topic, measurement and
//! transport settings. It is resolved once from environment variables at
//! startup and stays immutable afterwards.
//!
//! Resolution goes through a key lookup closure so tests can supply a map
//! instead of mutating the process environment.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use speedtest_mqtt_transport::TlsConfig;
use validator::Validate;

use self::{
    broker::BrokerEndpoint,
    logger::{ConsoleConfig, LogFormat, LoggerConfig},
    speedtest::{SpeedtestConfig, TopicsConfig},
};

pub mod broker;
pub mod logger;
pub mod speedtest;

/// Transport-layer configuration.
pub type TransportConfig = speedtest_mqtt_transport::Config;

/// Simple macros for printing timestamped messages before the tracing subscriber
/// is initialized. These are used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur while resolving or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// The environment variable at fault, when there is a single one.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::Missing(key) | ConfigError::Invalid { key, .. } => Some(key),
            ConfigError::ValidationError(_) => None,
        }
    }
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[validate(nested)]
    pub topics: TopicsConfig,

    #[validate(nested)]
    pub speedtest: SpeedtestConfig,

    /// Broker connection settings.
    #[validate(nested)]
    pub transport: TransportConfig,
}

impl Config {
    /// Resolves configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        print_info!("Loading configuration from environment");
        let config = Self::from_lookup(|key: &str| std::env::var(key).ok())?;
        print_info!(
            "Configuration loaded: broker {}:{}, topic '{}'",
            config.transport.host,
            config.transport.port,
            config.topics.base_topic
        );
        Ok(config)
    }

    /// Resolves configuration through `lookup`, which returns the raw value
    /// of a variable or `None` when it is unset.
    ///
    /// # Errors
    ///
    /// `Missing` for absent required variables, `Invalid` for values that
    /// do not parse, `ValidationError` when a resolved value is out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource { lookup };

        let broker = env.required("MQTT_BROKER")?;
        let username = env.required_verbatim("MQTT_USERNAME")?;
        let password = env.required_verbatim("MQTT_PASSWORD")?;

        let endpoint: BrokerEndpoint = broker.parse().map_err(|reason| ConfigError::Invalid {
            key: "MQTT_BROKER".into(),
            reason,
        })?;

        let tls = if endpoint.tls {
            let ca = env.required("MQTT_CA_CERT")?;
            let tls = match (env.optional("MQTT_CLIENT_CERT"), env.optional("MQTT_CLIENT_KEY")) {
                (Some(cert), Some(key)) => TlsConfig::new(ca, cert, key),
                (None, None) => TlsConfig::with_ca_only(ca),
                (Some(_), None) => return Err(ConfigError::Missing("MQTT_CLIENT_KEY".into())),
                (None, Some(_)) => return Err(ConfigError::Missing("MQTT_CLIENT_CERT".into())),
            };
            tls.validate_config().map_err(|e| ConfigError::Invalid {
                key: "MQTT_CA_CERT".into(),
                reason: e.to_string(),
            })?;
            if tls.has_client_auth() {
                print_info!("Mutual TLS enabled for broker {}", endpoint);
            }
            Some(tls)
        } else {
            for key in ["MQTT_CA_CERT", "MQTT_CLIENT_CERT", "MQTT_CLIENT_KEY"] {
                if env.optional(key).is_some() {
                    print_warn!("{} is ignored for plain TCP broker {}", key, endpoint);
                }
            }
            None
        };

        let defaults = TransportConfig::default();
        let transport = TransportConfig {
            host: endpoint.host,
            port: endpoint.port,
            client_id: env.optional("MQTT_CLIENT_ID").unwrap_or(defaults.client_id),
            username: Some(username),
            password: Some(password),
            keep_alive: env.parse("MQTT_KEEP_ALIVE", defaults.keep_alive)?,
            connection_timeout: env.parse("MQTT_CONNECT_TIMEOUT", defaults.connection_timeout)?,
            tls,
            ..TransportConfig::default()
        };

        let base_topic = env
            .optional("MQTT_TOPIC")
            .unwrap_or_else(|| TopicsConfig::default().base_topic);
        let topics = TopicsConfig {
            // Set-but-empty disables discovery; unset falls back to the default.
            discovery_root: env
                .raw("MQTT_HOME_ASSISTANT_DISCOVERY")
                .unwrap_or_else(|| TopicsConfig::default().discovery_root),
            sensor_name: env
                .optional("MQTT_NAME")
                .unwrap_or_else(|| base_topic.clone()),
            base_topic,
        };

        let logger = LoggerConfig {
            level: env.log_level("MQTT_LOG_LEVEL"),
            console: ConsoleConfig {
                format: env.parse("MQTT_LOG_FORMAT", LogFormat::default())?,
                ansi_colors: env.flag("MQTT_LOG_ANSI", true)?,
                ..ConsoleConfig::default()
            },
        };

        let speedtest_defaults = SpeedtestConfig::default();
        let speedtest = SpeedtestConfig {
            server_ids: env.id_list("SPEEDTEST_SERVER_IDS")?,
            multi_connection: env.flag("SPEEDTEST_MULTI_CONNECTION", false)?,
            timeout_secs: env.parse("SPEEDTEST_TIMEOUT", speedtest_defaults.timeout_secs)?,
            server_limit: env.parse("SPEEDTEST_SERVER_LIMIT", speedtest_defaults.server_limit)?,
        };

        let config = Config {
            logger,
            topics,
            speedtest,
            transport,
        };

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}

/// Typed accessors over a raw key lookup.
struct EnvSource<F> {
    lookup: F,
}

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value as set, including an empty string.
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string())
    }

    /// Untrimmed value; only an empty string counts as missing.
    fn required_verbatim(&self, key: &str) -> Result<String, ConfigError> {
        (self.lookup)(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Log level; an unknown level falls back to `error`.
    fn log_level(&self, key: &str) -> String {
        let Some(level) = self.optional(key) else {
            return LoggerConfig::default().level;
        };
        if LoggerConfig::is_known_level(&level) {
            return level;
        }
        print_warn!("Unknown {} '{}', logging at error level", key, level);
        "error".to_string()
    }

    /// Value, with empty treated as unset.
    fn optional(&self, key: &str) -> Option<String> {
        self.raw(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.to_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    reason: format!("'{v}' is not a boolean"),
                }),
            },
        }
    }

    /// Comma-separated numeric ids; blanks between commas are skipped.
    fn id_list(&self, key: &str) -> Result<Vec<u32>, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(Vec::new());
        };

        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>().map_err(|e| ConfigError::Invalid {
                    key: key.to_string(),
                    reason: format!("'{part}': {e}"),
                })
            })
            .collect()
    }
}
