//! speedtest.net client: directory lookup, endpoint selection and the
//! three measurement phases.

use std::time::Duration;

use thiserror::Error;

pub mod directory;
pub mod plan;
pub mod runner;
pub mod selector;
pub mod server;
pub mod types;

pub use directory::{Directory, SpeedtestNetDirectory};
pub use plan::{TransferMode, TransferPlan};
pub use runner::MeasurementRunner;
pub use selector::EndpointSelector;
pub use server::{HttpTargetFactory, MeasurementTarget, TargetFactory};
pub use types::{MeasurementResult, ServerInfo, UserInfo};

/// Failures talking to the directory or to a measurement server.
#[derive(Debug, Error)]
pub enum SpeedtestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// No bytes moved, or the clock did not advance.
    #[error("Measurement window was empty")]
    EmptyMeasurement,
}

/// Builds the HTTP client shared by the directory and the measurement target.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SpeedtestError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(timeout)
        .build()?;
    Ok(client)
}
