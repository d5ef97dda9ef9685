//! Run-level error taxonomy.
//!
//! Every failure in the pipeline ends up as one `RunError`. Each variant
//! maps to its own process exit status so callers (cron, systemd, a Home
//! Assistant add-on) can tell the failure apart without parsing logs.

use speedtest_mqtt_transport::TransferError;
use thiserror::Error;

use crate::{config::ConfigError, core::speedtest::SpeedtestError, logger::LoggerError};

/// Boxed error returned by `Publisher` implementations.
pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Logger setup failed: {0}")]
    Logger(#[from] LoggerError),

    #[error("{0}")]
    ConfigMissing(#[from] ConfigError),

    #[error("Broker connection failed: {0}")]
    ConnectFailed(#[source] TransferError),

    #[error("Speedtest directory unavailable: {0}")]
    DirectoryUnavailable(#[source] SpeedtestError),

    #[error("No measurement endpoint available (filter: {filter:?})")]
    NoEndpointAvailable { filter: Vec<u32> },

    #[error("Ping test failed against server {server_id}: {source}")]
    PingFailed {
        server_id: u32,
        #[source]
        source: SpeedtestError,
    },

    #[error("Download test failed against server {server_id}: {source}")]
    DownloadFailed {
        server_id: u32,
        #[source]
        source: SpeedtestError,
    },

    #[error("Upload test failed against server {server_id}: {source}")]
    UploadFailed {
        server_id: u32,
        #[source]
        source: SpeedtestError,
    },

    #[error("Invalid measurement result: {0}")]
    InvalidMeasurementResult(String),

    #[error("Publishing to '{topic}' failed: {source}")]
    PublishFailed {
        topic: String,
        #[source]
        source: PublishError,
    },

    #[error("Interrupted before the run completed")]
    Interrupted,
}

impl RunError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Logger(_) => 1,
            RunError::ConfigMissing(_) => 2,
            RunError::ConnectFailed(_) => 3,
            RunError::DirectoryUnavailable(_) => 4,
            RunError::NoEndpointAvailable { .. } => 5,
            RunError::PingFailed { .. } => 6,
            RunError::DownloadFailed { .. } => 7,
            RunError::UploadFailed { .. } => 8,
            RunError::InvalidMeasurementResult(_) => 9,
            RunError::PublishFailed { .. } => 10,
            RunError::Interrupted => 130,
        }
    }

    /// Stable identifier used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Logger(_) => "logger",
            RunError::ConfigMissing(_) => "config_missing",
            RunError::ConnectFailed(_) => "connect_failed",
            RunError::DirectoryUnavailable(_) => "directory_unavailable",
            RunError::NoEndpointAvailable { .. } => "no_endpoint_available",
            RunError::PingFailed { .. } => "ping_failed",
            RunError::DownloadFailed { .. } => "download_failed",
            RunError::UploadFailed { .. } => "upload_failed",
            RunError::InvalidMeasurementResult(_) => "invalid_measurement_result",
            RunError::PublishFailed { .. } => "publish_failed",
            RunError::Interrupted => "interrupted",
        }
    }

    /// Pipeline stage the failure happened in.
    pub fn phase(&self) -> &'static str {
        match self {
            RunError::Logger(_) | RunError::ConfigMissing(_) => "startup",
            RunError::ConnectFailed(_) => "connect",
            RunError::DirectoryUnavailable(_) | RunError::NoEndpointAvailable { .. } => "select",
            RunError::PingFailed { .. } => "ping",
            RunError::DownloadFailed { .. } => "download",
            RunError::UploadFailed { .. } => "upload",
            RunError::InvalidMeasurementResult(_) => "validate",
            RunError::PublishFailed { .. } => "publish",
            RunError::Interrupted => "interrupted",
        }
    }

    pub fn publish_failed(topic: impl Into<String>, source: PublishError) -> Self {
        RunError::PublishFailed {
            topic: topic.into(),
            source,
        }
    }
}
