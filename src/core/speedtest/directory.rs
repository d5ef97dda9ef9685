//! Directory service: who the client is and which servers exist.

use std::{collections::HashMap, sync::LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{
    selector::distance_km,
    types::{ServerInfo, UserInfo},
    SpeedtestError,
};

const CONFIG_URL: &str = "https://www.speedtest.net/speedtest-config.php";
const SERVERS_URL: &str = "https://www.speedtest.net/api/js/servers";

static CLIENT_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<client\s([^>]*?)/?>").expect("valid client regex"));

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("valid attribute regex"));

/// Source of client identity and candidate servers.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn fetch_user_info(&self) -> Result<UserInfo, SpeedtestError>;

    /// Candidates in directory order, with distances from `user` filled in.
    async fn fetch_servers(&self, user: &UserInfo) -> Result<Vec<ServerInfo>, SpeedtestError>;
}

/// The public speedtest.net directory.
pub struct SpeedtestNetDirectory {
    client: reqwest::Client,
    config_url: String,
    servers_url: String,
    limit: usize,
}

impl SpeedtestNetDirectory {
    pub fn new(client: reqwest::Client, limit: usize) -> Self {
        Self::with_endpoints(client, CONFIG_URL, SERVERS_URL, limit)
    }

    /// Points the directory at other URLs; used against local mock servers.
    pub fn with_endpoints(
        client: reqwest::Client,
        config_url: impl Into<String>,
        servers_url: impl Into<String>,
        limit: usize,
    ) -> Self {
        Self {
            client,
            config_url: config_url.into(),
            servers_url: servers_url.into(),
            limit,
        }
    }

    async fn get_text(&self, request: reqwest::RequestBuilder) -> Result<String, SpeedtestError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpeedtestError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Directory for SpeedtestNetDirectory {
    #[instrument(skip(self), fields(url = %self.config_url))]
    async fn fetch_user_info(&self) -> Result<UserInfo, SpeedtestError> {
        let body = self.get_text(self.client.get(&self.config_url)).await?;
        let user = parse_user_info(&body)?;
        debug!("Client {} ({}) at {}, {}", user.ip, user.isp, user.lat, user.lon);
        Ok(user)
    }

    #[instrument(skip(self, user), fields(url = %self.servers_url))]
    async fn fetch_servers(&self, user: &UserInfo) -> Result<Vec<ServerInfo>, SpeedtestError> {
        let request = self.client.get(&self.servers_url).query(&[
            ("engine", "js".to_string()),
            ("https_functional", "true".to_string()),
            ("limit", self.limit.to_string()),
        ]);
        let body = self.get_text(request).await?;

        let raw: Vec<RawServer> =
            serde_json::from_str(&body).map_err(|e| SpeedtestError::Parse(e.to_string()))?;
        debug!("Directory returned {} servers", raw.len());

        Ok(raw
            .into_iter()
            .filter_map(|server| server.into_server_info(user))
            .collect())
    }
}

/// Extracts the `<client .../>` attributes from speedtest-config.php.
pub fn parse_user_info(xml: &str) -> Result<UserInfo, SpeedtestError> {
    let element = CLIENT_ELEMENT
        .captures(xml)
        .and_then(|c| c.get(1))
        .ok_or_else(|| SpeedtestError::Parse("no <client> element in config".into()))?;

    let attrs: HashMap<&str, &str> = ATTRIBUTE
        .captures_iter(element.as_str())
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect();

    let coordinate = |key: &str| -> Result<f64, SpeedtestError> {
        attrs
            .get(key)
            .ok_or_else(|| SpeedtestError::Parse(format!("client element has no '{key}'")))?
            .parse()
            .map_err(|e| SpeedtestError::Parse(format!("client '{key}': {e}")))
    };
    let text = |key: &str| attrs.get(key).map(|v| v.to_string()).unwrap_or_default();

    Ok(UserInfo {
        ip: text("ip"),
        lat: coordinate("lat")?,
        lon: coordinate("lon")?,
        isp: text("isp"),
        country: text("country"),
    })
}

/// Server entry as the JSON API returns it: coordinates and id are strings.
#[derive(Debug, Deserialize)]
struct RawServer {
    #[serde(default)]
    url: String,
    #[serde(default)]
    lat: String,
    #[serde(default)]
    lon: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    sponsor: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    host: String,
}

impl RawServer {
    fn into_server_info(self, user: &UserInfo) -> Option<ServerInfo> {
        let id = match self.id.parse::<u32>() {
            Ok(id) => id,
            Err(e) => {
                debug!("Skipping server with id '{}': {}", self.id, e);
                return None;
            }
        };

        let (lat, lon) = match (self.lat.parse::<f64>(), self.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => (lat, lon),
            _ => {
                debug!("Skipping server {} with unparsable coordinates", id);
                return None;
            }
        };

        if self.url.is_empty() {
            debug!("Skipping server {} without an upload URL", id);
            return None;
        }

        Some(ServerInfo {
            id,
            distance: distance_km(user.lat, user.lon, lat, lon),
            name: self.name,
            sponsor: self.sponsor,
            country: self.country,
            host: self.host,
            url: self.url,
            lat,
            lon,
        })
    }
}
