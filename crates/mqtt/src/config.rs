//! Configuration structures for MQTT connections.
//!
//! All configurations derive serde traits and carry `validator` constraints,
//! so an invalid broker setup is rejected before any socket is opened.
//!
//! # Examples
//!
//! ```ignore
//! let config = Config {
//!     host: "mqtt.example.com".into(),
//!     port: 8883,
//!     username: Some("user".into()),
//!     password: Some("secret".into()),
//!     tls: Some(TlsConfig::with_ca_only("/etc/mqtt/ca.crt")),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Main MQTT connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Broker hostname or IP address.
    ///
    /// DNS resolution happens at connection time, not validation time.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port number (1883 plain, 8883 TLS).
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Seconds to wait for CONNACK, and for the final flush on shutdown.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Whether to request a clean session from the broker.
    pub clean_session: bool,

    /// Maximum number of QoS 1 and QoS 2 messages in flight simultaneously.
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max inflight must be between 1 and 1000"
    ))]
    pub max_inflight: u16,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Unique identifier for this client. Empty is replaced with a UUID.
    #[validate(length(max = 36, message = "Client ID must be at most 36 characters"))]
    pub client_id: String,

    /// Username sent in CONNECT. Credentials are only set when both
    /// username and password are present.
    pub username: Option<String>,

    /// Password sent in CONNECT.
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Maximum MQTT packet size (bytes), incoming and outgoing.
    #[validate(range(
        min = 64,
        max = 65535,
        message = "Max packet size must be between 64 and 65535 bytes"
    ))]
    pub max_packet_size: Option<u16>,

    /// How many requests can be queued before `publish` awaits.
    #[validate(range(
        min = 1,
        max = 255,
        message = "Request channel capacity must be between 1 and 255"
    ))]
    pub request_channel_capacity: Option<u8>,

    /// Optional TLS configuration. Present and enabled means the broker
    /// connection is encrypted.
    #[validate(nested)]
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    /// Local development defaults: plain TCP to localhost, no credentials.
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 1883,
            connection_timeout: 30,
            clean_session: true,
            max_inflight: 10,
            keep_alive: 60,
            client_id: Uuid::new_v4().to_string(),
            username: None,
            password: None,
            max_packet_size: Some(65_535),
            request_channel_capacity: Some(10),
            tls: None,
        }
    }
}

impl Config {
    /// Returns `(username, password)` when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// TLS configuration for secure broker connections.
///
/// Files are checked when `ClientBuilder::build()` runs, not when this
/// struct is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TlsConfig {
    /// CA certificate (PEM) used to verify the broker.
    pub ca_cert_path: Option<String>,

    /// Client certificate (PEM) for mutual TLS. Must be paired with
    /// `client_key_path`.
    pub client_cert_path: Option<String>,

    /// Client private key (PEM, unencrypted) for mutual TLS.
    pub client_key_path: Option<String>,
}

impl TlsConfig {
    /// Creates a TLS configuration with full mutual authentication.
    pub fn new(
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: Some(client_cert_path.into()),
            client_key_path: Some(client_key_path.into()),
        }
    }

    /// Creates a TLS configuration with CA-only verification.
    pub fn with_ca_only(ca_cert_path: impl Into<String>) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: None,
            client_key_path: None,
        }
    }

    /// True only if BOTH client certificate and key are specified.
    pub fn has_client_auth(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }

    /// TLS is enabled once a CA certificate is configured.
    pub fn is_enabled(&self) -> bool {
        self.ca_cert_path.is_some()
    }

    /// Checks that the referenced files exist and that client auth is
    /// either fully configured or absent.
    pub fn validate_config(&self) -> Result<(), ValidationError> {
        let Some(ca) = self.ca_cert_path.as_deref() else {
            return Err(ValidationError::new("missing_ca_cert")
                .with_message("CA certificate path is required".into()));
        };
        validate_file_path(ca)?;

        match (
            self.client_cert_path.as_deref(),
            self.client_key_path.as_deref(),
        ) {
            (Some(cert), Some(key)) => {
                validate_file_path(cert)?;
                validate_file_path(key)?;
            }
            (None, None) => {}
            _ => {
                return Err(ValidationError::new("incomplete_client_auth").with_message(
                    "Both client certificate and key must be provided or neither".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Validates that a path is non-empty and points to an existing file.
fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(
            ValidationError::new("empty_path").with_message("File path cannot be empty".into())
        );
    }

    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(ValidationError::new("file_not_found")
            .with_message(format!("File does not exist: {path}").into()));
    }

    if !path_obj.is_file() {
        return Err(ValidationError::new("not_a_file")
            .with_message(format!("Path is not a file: {path}").into()));
    }

    Ok(())
}

/// Metadata for a single publish: topic, QoS and retain flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EndpointMetadata {
    /// MQTT Quality of Service level (0, 1 or 2).
    #[validate(range(min = 0, max = 2, message = "Invalid QoS value, must be 0, 1, or 2"))]
    pub qos: u8,

    /// Concrete topic, no wildcards.
    #[validate(length(min = 1, message = "Topic must not be empty"))]
    pub topic: String,

    /// Whether the broker keeps the message for late subscribers.
    pub retain: bool,
}

impl EndpointMetadata {
    /// QoS 0, retained. Used for configuration-style topics.
    pub fn retained(topic: impl Into<String>) -> Self {
        Self {
            qos: 0,
            topic: topic.into(),
            retain: true,
        }
    }

    /// QoS 0, not retained. Used for one-off state updates.
    pub fn at_most_once(topic: impl Into<String>) -> Self {
        Self {
            qos: 0,
            topic: topic.into(),
            retain: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.client_id.len(), 36);
    }

    #[test]
    fn test_empty_host_rejected() {
        let config = Config {
            host: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keep_alive_range() {
        let config = Config {
            keep_alive: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let mut config = Config {
            username: Some("user".into()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());

        config.password = Some("pass".into());
        assert_eq!(config.credentials(), Some(("user", "pass")));
    }

    #[test]
    fn test_password_not_serialized() {
        let config = Config {
            username: Some("user".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_tls_missing_ca_file() {
        let tls = TlsConfig::with_ca_only("/nonexistent/ca.crt");
        assert!(tls.validate_config().is_err());
    }

    #[test]
    fn test_tls_incomplete_client_auth() {
        let dir = TempDir::new().unwrap();
        let ca = dir.path().join("ca.crt");
        File::create(&ca).unwrap().write_all(b"ca").unwrap();

        let tls = TlsConfig {
            ca_cert_path: Some(ca.to_string_lossy().into_owned()),
            client_cert_path: Some("/tmp/client.crt".into()),
            client_key_path: None,
        };
        let err = tls.validate_config().unwrap_err();
        assert_eq!(err.code, "incomplete_client_auth");
    }

    #[test]
    fn test_endpoint_metadata_constructors() {
        let retained = EndpointMetadata::retained("homeassistant/sensor/x/config");
        assert!(retained.retain);
        assert_eq!(retained.qos, 0);

        let state = EndpointMetadata::at_most_once("speedtest");
        assert!(!state.retain);
        assert_eq!(state.qos, 0);
    }

    #[test]
    fn test_endpoint_metadata_validation() {
        let bad = EndpointMetadata {
            qos: 3,
            topic: "t".into(),
            retain: false,
        };
        assert!(bad.validate().is_err());

        let empty = EndpointMetadata::at_most_once("");
        assert!(empty.validate().is_err());
    }
}
