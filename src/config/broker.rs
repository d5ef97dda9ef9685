//! Broker address parsing.
//!
//! Accepts `scheme://host[:port]` for the schemes below, or a bare
//! `host:port` which is treated as `tcp://host:port`.
//!
//! | Scheme | Transport | Default port |
//! |---|---|---|
//! | `tcp`, `mqtt` | plain TCP | 1883 |
//! | `ssl`, `tls`, `mqtts` | TLS | 8883 |

use std::{fmt, str::FromStr};

use url::Url;

const PLAIN_PORT: u16 = 1883;
const TLS_PORT: u16 = 8883;

/// Host, port and transport security of the MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl FromStr for BrokerEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("tcp://{raw}")
        };

        let url = Url::parse(&with_scheme).map_err(|e| format!("'{raw}' is not a URL: {e}"))?;

        let tls = match url.scheme() {
            "tcp" | "mqtt" => false,
            "ssl" | "tls" | "mqtts" => true,
            other => return Err(format!("unsupported scheme '{other}'")),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| format!("'{raw}' has no host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        if !matches!(url.path(), "" | "/") {
            return Err(format!("'{raw}' must not contain a path"));
        }

        let port = url
            .port()
            .unwrap_or(if tls { TLS_PORT } else { PLAIN_PORT });

        Ok(BrokerEndpoint { host, port, tls })
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "ssl" } else { "tcp" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_url() {
        let endpoint: BrokerEndpoint = "tcp://127.0.0.1:1884".parse().unwrap();
        assert_eq!(
            endpoint,
            BrokerEndpoint {
                host: "127.0.0.1".into(),
                port: 1884,
                tls: false,
            }
        );
    }

    #[test]
    fn test_bare_host_port_is_tcp() {
        let endpoint: BrokerEndpoint = "broker.local:1883".parse().unwrap();
        assert_eq!(endpoint.host, "broker.local");
        assert_eq!(endpoint.port, 1883);
        assert!(!endpoint.tls);
    }

    #[test]
    fn test_default_ports() {
        let plain: BrokerEndpoint = "mqtt://broker.local".parse().unwrap();
        assert_eq!(plain.port, 1883);

        let secure: BrokerEndpoint = "mqtts://broker.local".parse().unwrap();
        assert_eq!(secure.port, 8883);
        assert!(secure.tls);
    }

    #[test]
    fn test_ipv6_brackets_removed() {
        let endpoint: BrokerEndpoint = "tcp://[::1]:1883".parse().unwrap();
        assert_eq!(endpoint.host, "::1");
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = "ws://broker.local:9001".parse::<BrokerEndpoint>().unwrap_err();
        assert!(err.contains("unsupported scheme"));
    }

    #[test]
    fn test_rejects_path() {
        assert!("tcp://broker.local:1883/mqtt"
            .parse::<BrokerEndpoint>()
            .is_err());
    }

    #[test]
    fn test_display() {
        let endpoint: BrokerEndpoint = "tls://broker.local".parse().unwrap();
        assert_eq!(endpoint.to_string(), "ssl://broker.local:8883");
    }
}
