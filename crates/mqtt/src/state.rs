//! Connection state tracking for the MQTT client.
//!
//! The connection kernel broadcasts a `ConnectionState` on a watch channel.
//! There is no reconnect cycle: a connection goes `Connecting` →
//! `Connected` → `Disconnected`, or straight from `Connecting` to
//! `Disconnected` when the broker cannot be reached.

use std::fmt;

/// Represents the current state of an MQTT connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// CONNECT sent (or about to be), waiting for CONNACK.
    Connecting,

    /// CONNACK received with a success return code. Publishes are flushed
    /// to the broker in this state.
    Connected,

    /// The connection ended. The string holds the reason, either an error
    /// reported by the event loop or a client-initiated disconnect.
    Disconnected(String),
}

impl ConnectionState {
    /// Returns a short identifier for the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected(_) => "Disconnected",
        }
    }

    /// Returns the disconnect reason, or an empty string for other states.
    pub fn details(&self) -> &str {
        match self {
            ConnectionState::Disconnected(reason) => reason,
            _ => "",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True once the connection can no longer carry publishes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())?;
        let details = self.details();
        if !details.is_empty() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_as_str() {
        assert_eq!(ConnectionState::Connecting.as_str(), "Connecting");
        assert_eq!(ConnectionState::Connected.as_str(), "Connected");
        assert_eq!(
            ConnectionState::Disconnected("test".into()).as_str(),
            "Disconnected"
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionState::Disconnected("broker closed".into()).to_string(),
            "Disconnected (broker closed)"
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Disconnected("error".into()).is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
        assert!(ConnectionState::Connected.is_connected());
    }
}
