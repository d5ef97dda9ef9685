//! Payload serialization.
//!
//! Every payload this crate sends is JSON. The serializer sits behind a
//! trait so the publisher does not depend on serde_json directly.

use serde::Serialize;

use super::error::TransferError;

/// Encodes payloads to bytes.
pub trait MessageSerializer: Send + Sync {
    fn to_bytes<T: Serialize + ?Sized>(&self, data: &T) -> Result<Vec<u8>, TransferError>;
}

/// JSON serializer using serde_json.
#[derive(Debug, Default, Copy, Clone)]
pub struct JsonSerializer;

impl MessageSerializer for JsonSerializer {
    fn to_bytes<T: Serialize + ?Sized>(&self, data: &T) -> Result<Vec<u8>, TransferError> {
        serde_json::to_vec(data).map_err(|e| TransferError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        latency: f64,
        label: String,
    }

    #[test]
    fn test_json_serializer() {
        let serializer = JsonSerializer;
        let reading = Reading {
            latency: 12.5,
            label: "ping".into(),
        };

        let bytes = serializer.to_bytes(&reading).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"latency":12.5,"label":"ping"}"#
        );

        let back: Reading = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn test_non_string_map_keys_fail() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);

        let err = JsonSerializer.to_bytes(&map).unwrap_err();
        assert!(matches!(err, TransferError::Serialization(_)));
    }
}
