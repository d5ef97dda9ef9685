//! Records exchanged between the directory, the runner and the publisher.

use serde::{Deserialize, Serialize};

/// Client identity as reported by speedtest.net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub ip: String,
    pub lat: f64,
    pub lon: f64,
    pub isp: String,
    pub country: String,
}

/// A measurement server from the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: u32,
    pub name: String,
    pub sponsor: String,
    pub country: String,
    pub host: String,
    /// Upload endpoint; the other test resources live next to it.
    pub url: String,
    pub lat: f64,
    pub lon: f64,
    /// Great-circle distance from the client in km.
    pub distance: f64,
}

/// Server identity plus the three measured values.
///
/// Serialized as one flat JSON object: the state payload Home Assistant
/// reads `latency`, `dl_speed` and `ul_speed` from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    #[serde(flatten)]
    pub server: ServerInfo,

    /// Round-trip time in milliseconds.
    pub latency: f64,

    /// Download throughput in Mbps.
    pub dl_speed: f64,

    /// Upload throughput in Mbps.
    pub ul_speed: f64,
}

impl MeasurementResult {
    /// A result with no phase run yet; every metric is zero.
    pub fn pending(server: ServerInfo) -> Self {
        MeasurementResult {
            server,
            latency: 0.0,
            dl_speed: 0.0,
            ul_speed: 0.0,
        }
    }
}
