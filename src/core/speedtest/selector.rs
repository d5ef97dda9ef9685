//! Picks the one server a run measures against.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{directory::Directory, types::ServerInfo};
use crate::error::RunError;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in km (haversine).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Keeps the servers whose id is in `filter`, preserving directory order.
/// An empty filter keeps everything.
pub fn filter_candidates(servers: Vec<ServerInfo>, filter: &[u32]) -> Vec<ServerInfo> {
    if filter.is_empty() {
        return servers;
    }
    servers
        .into_iter()
        .filter(|server| filter.contains(&server.id))
        .collect()
}

pub struct EndpointSelector {
    directory: Arc<dyn Directory>,
    filter: Vec<u32>,
}

impl EndpointSelector {
    pub fn new(directory: Arc<dyn Directory>, filter: Vec<u32>) -> Self {
        Self { directory, filter }
    }

    /// Returns the first candidate the directory offers that passes the filter.
    ///
    /// The directory already sorts by proximity; nothing is re-ranked here.
    #[instrument(skip(self), fields(filter = ?self.filter))]
    pub async fn select(&self) -> Result<ServerInfo, RunError> {
        let user = self
            .directory
            .fetch_user_info()
            .await
            .map_err(RunError::DirectoryUnavailable)?;

        let servers = self
            .directory
            .fetch_servers(&user)
            .await
            .map_err(RunError::DirectoryUnavailable)?;
        let offered = servers.len();

        let candidates = filter_candidates(servers, &self.filter);
        debug!("{} of {} servers pass the filter", candidates.len(), offered);

        let server = candidates
            .into_iter()
            .next()
            .ok_or_else(|| RunError::NoEndpointAvailable {
                filter: self.filter.clone(),
            })?;

        info!(
            "Selected server {} ({}, {}) hosted by {} at {:.1} km",
            server.id, server.name, server.country, server.sponsor, server.distance
        );
        Ok(server)
    }
}
