//! # speedtest-mqtt-transport: publish-only MQTT sessions
//!
//! A small async layer over `rumqttc` for programs that connect once,
//! publish a handful of messages and disconnect. It adds:
//!
//! - **Validated configuration** with credentials and TLS
//! - **Connection state tracking** over a watch channel
//! - **Bounded connect wait** that reports why a connection failed
//! - **Ordered shutdown**: DISCONNECT is sent only after queued publishes
//! - **JSON payloads** via serde
//!
//! There is no reconnection and no subscription support. The first
//! connection error ends the session.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::{sync::Arc, time::Duration};
//!
//! use speedtest_mqtt_transport::{Config, EndpointMetadata, MqttManager, Publisher};
//!
//! #[derive(serde::Serialize)]
//! struct Sample {
//!     latency: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         host: "mqtt.example.com".into(),
//!         username: Some("user".into()),
//!         password: Some("secret".into()),
//!         ..Default::default()
//!     };
//!
//!     let instance = Arc::new(MqttManager::from_config(config)?.build_and_start().await?);
//!     instance.wait_connected(Duration::from_secs(30)).await?;
//!
//!     Publisher::new(instance.clone())
//!         .publish(&Sample { latency: 12.0 }, &EndpointMetadata::at_most_once("speedtest"))
//!         .await?;
//!
//!     instance.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Connection lifecycle
//!
//! ```text
//! Connecting ──CONNACK──▶ Connected ──DISCONNECT sent──▶ Disconnected
//!      │                      │
//!      └──────error───────────┴──────────────────────────▶ Disconnected(reason)
//! ```
//!
//! # TLS
//!
//! ```ignore
//! let config = Config {
//!     port: 8883,
//!     tls: Some(TlsConfig::with_ca_only("/etc/mqtt/ca.crt")),
//!     ..Default::default()
//! };
//! ```
//!
//! Certificates are read when the client is built. A missing file fails
//! with `TransferError::ClientSetup` before any network activity.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod publisher;
pub mod state;

pub use client::ClientBuilder;
pub use config::{Config, EndpointMetadata, TlsConfig};
pub use connection::ConnectionKernel;
pub use error::TransferError;
pub use manager::{MqttInstance, MqttManager};
pub use publisher::Publisher;
pub use state::ConnectionState;

/// Result type for MQTT operations.
pub type Result<T> = std::result::Result<T, TransferError>;
