//! Error handling for MQTT transfer operations.
//!
//! `TransferError` is the single error type returned by this crate. It
//! aggregates failures from rumqttc, configuration validation, file IO (TLS
//! material) and payload serialization so callers can pattern-match on one
//! enum.
//!
//! # Error Categories
//!
//! **Configuration** (caught at startup):
//! - `InvalidMetadata`, `ClientSetup`, `ConfigError`
//!
//! **Serialization**:
//! - `Serialization`
//!
//! **Runtime**:
//! - `ClientTransfer`: the local request queue rejected a publish
//! - `ClientConnection`: network-level connection error
//! - `ConnectionKernel`: the event loop stopped or never reached CONNACK
//! - `ConnectTimeout`: no CONNACK (or no flush) within the configured window
//! - `Io`: file IO while loading certificates

use std::time::Duration;

use thiserror::Error;

/// The unified error type for MQTT transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Endpoint metadata is invalid (QoS outside 0..=2, empty topic).
    ///
    /// This is a programming error and should be caught by validation.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Data serialization to bytes failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// MQTT client initialization failed.
    ///
    /// Usually a TLS path that does not exist or cannot be read.
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// The connection kernel stopped before the operation could complete.
    ///
    /// Carries the reason the kernel reported (refused CONNACK, socket
    /// closed, task panicked).
    #[error("Connection kernel error: {0}")]
    ConnectionKernel(String),

    /// No CONNACK or flush confirmation arrived in time.
    #[error("Timed out after {0:?} waiting for the broker")]
    ConnectTimeout(Duration),

    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// MQTT client failed to queue a packet (request channel closed).
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// MQTT connection to broker failed or was lost.
    ///
    /// Boxed to keep the enum small.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// I/O operation failed (certificate loading, not network).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxes rumqttc's `ConnectionError` so `?` works on event loop results.
impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_display() {
        let err = TransferError::InvalidMetadata("QoS must be 0-2".into());
        assert_eq!(err.to_string(), "Invalid metadata: QoS must be 0-2");
    }

    #[test]
    fn test_transfer_error_serialization() {
        let err = TransferError::Serialization("key must be a string".into());
        assert_eq!(err.to_string(), "Serialization error: key must be a string");
    }

    #[test]
    fn test_transfer_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let transfer_err: TransferError = io_err.into();
        assert!(transfer_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_transfer_error_from_connection_error() {
        let conn_err = rumqttc::ConnectionError::NetworkTimeout;
        let transfer_err: TransferError = conn_err.into();
        assert!(matches!(transfer_err, TransferError::ClientConnection(_)));
    }

    #[test]
    fn test_connect_timeout_mentions_duration() {
        let err = TransferError::ConnectTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
