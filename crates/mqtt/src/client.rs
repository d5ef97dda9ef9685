//! MQTT client construction with credentials and TLS support.
//!
//! `ClientBuilder` turns a validated `Config` into rumqttc `MqttOptions` and
//! transport settings. `build()` returns the `AsyncClient` used to publish
//! and the `EventLoop` the connection kernel drives.
//!
//! # Examples
//!
//! ```ignore
//! let (client, event_loop) = ClientBuilder::from_config(&config)?.build()?;
//! ```

use std::{fs, time::Duration};

use rumqttc::{AsyncClient, EventLoop, MqttOptions, TlsConfiguration, Transport};
use tracing::debug;
use validator::Validate;

use super::{
    config::{Config, TlsConfig},
    error::TransferError,
};

/// Builder for an `AsyncClient` and its `EventLoop`.
///
/// The two halves must be used together: the client queues requests, the
/// event loop sends them over the wire.
pub struct ClientBuilder {
    opts: MqttOptions,

    /// Capacity of the request channel between client and event loop.
    cap: usize,

    tls_config: Option<TlsConfig>,
}

impl ClientBuilder {
    /// Creates a builder from a validated `Config`.
    ///
    /// Fails with `ConfigError` when any field is outside its allowed range.
    /// An empty `client_id` is replaced with a random UUID.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        config.validate()?;

        let client_id = if config.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.client_id.clone()
        };

        let mut opts = MqttOptions::new(client_id, config.host.clone(), config.port);
        opts.set_keep_alive(Duration::from_secs(config.keep_alive));
        opts.set_clean_session(config.clean_session);
        opts.set_inflight(config.max_inflight);

        if let Some(max_packet_size) = config.max_packet_size {
            opts.set_max_packet_size(max_packet_size as usize, max_packet_size as usize);
        }

        if let Some((username, password)) = config.credentials() {
            opts.set_credentials(username, password);
        }

        let cap = config.request_channel_capacity.unwrap_or(10) as usize;

        let tls_config = config.tls.clone().filter(TlsConfig::is_enabled);

        Ok(Self {
            opts,
            cap,
            tls_config,
        })
    }

    fn load_file(path: &str) -> Result<Vec<u8>, TransferError> {
        Ok(fs::read(path)?)
    }

    /// Reads the certificate material and builds a TLS transport.
    fn build_tls_transport(tls_config: &TlsConfig) -> Result<Transport, TransferError> {
        tls_config
            .validate_config()
            .map_err(|e| TransferError::ClientSetup(format!("Invalid TLS configuration: {e}")))?;

        let ca_path = tls_config
            .ca_cert_path
            .as_deref()
            .ok_or_else(|| TransferError::ClientSetup("CA certificate path is not set".into()))?;
        let ca = Self::load_file(ca_path)?;

        let client_auth = match (
            tls_config.client_cert_path.as_deref(),
            tls_config.client_key_path.as_deref(),
        ) {
            (Some(cert), Some(key)) if tls_config.has_client_auth() => {
                debug!("Loading client certificate for mutual TLS");
                Some((Self::load_file(cert)?, Self::load_file(key)?))
            }
            _ => None,
        };

        Ok(Transport::Tls(TlsConfiguration::Simple {
            ca,
            client_auth,
            alpn: None,
        }))
    }

    /// Constructs the client and event loop, consuming the builder.
    ///
    /// No network activity happens here; the connection is opened on the
    /// first poll of the event loop.
    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        let mut opts = self.opts;

        if let Some(tls_config) = self.tls_config.as_ref() {
            opts.set_transport(Self::build_tls_transport(tls_config)?);
        } else {
            opts.set_transport(Transport::Tcp);
        }

        Ok(AsyncClient::new(opts, self.cap))
    }
}
