//! Message publishing with JSON serialization.
//!
//! `Publisher` validates the endpoint metadata, serializes the payload and
//! queues a PUBLISH on the shared client. Topics are used exactly as given.
//!
//! # Examples
//!
//! ```ignore
//! #[derive(Serialize)]
//! struct Sample { latency: f64 }
//!
//! let publisher = Publisher::new(instance);
//! publisher
//!     .publish(&Sample { latency: 12.0 }, &EndpointMetadata::at_most_once("speedtest"))
//!     .await?;
//! ```

use std::sync::Arc;

use rumqttc::QoS;
use serde::Serialize;
use tracing::debug;
use validator::Validate;

use super::{
    config::EndpointMetadata,
    manager::MqttInstance,
    message::{JsonSerializer, MessageSerializer},
    TransferError,
};

/// Publishes serializable values over an `MqttInstance`.
///
/// Cloning is cheap; clones share the instance.
#[derive(Clone)]
pub struct Publisher {
    instance: Arc<MqttInstance>,
    serializer: JsonSerializer,
}

impl Publisher {
    pub fn new(instance: Arc<MqttInstance>) -> Self {
        Self {
            instance,
            serializer: JsonSerializer,
        }
    }

    /// Serializes `data` to JSON and queues it for `metadata.topic`.
    ///
    /// Returning `Ok` means the request was accepted by the client queue.
    /// It is flushed to the broker before any later DISCONNECT.
    pub async fn publish<T: Serialize + Send + Sync + ?Sized>(
        &self,
        data: &T,
        metadata: &EndpointMetadata,
    ) -> Result<(), TransferError> {
        metadata
            .validate()
            .map_err(|e| TransferError::InvalidMetadata(e.to_string()))?;

        let payload = self.serializer.to_bytes(data)?;
        let qos = qos_from_u8(metadata.qos)?;

        debug!(
            "Publishing to topic '{}': {} bytes (retain: {})",
            metadata.topic,
            payload.len(),
            metadata.retain
        );

        self.instance
            .client()
            .publish(metadata.topic.clone(), qos, metadata.retain, payload)
            .await?;

        Ok(())
    }
}

/// Maps a numeric QoS level to rumqttc's enum.
pub fn qos_from_u8(qos: u8) -> Result<QoS, TransferError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(TransferError::InvalidMetadata(format!(
            "Invalid QoS value: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::manager::{
        tests::{fake_broker, local_config},
        MqttManager,
    };

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos_from_u8(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
        assert!(matches!(
            qos_from_u8(3),
            Err(TransferError::InvalidMetadata(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_topic() {
        let (port, _received) = fake_broker(0x00).await;
        let instance = MqttManager::from_config(local_config(port))
            .unwrap()
            .build_and_start()
            .await
            .unwrap();
        let instance = Arc::new(instance);
        let publisher = Publisher::new(instance.clone());

        let result = publisher
            .publish(&json!({"a": 1}), &EndpointMetadata::at_most_once(""))
            .await;
        assert!(matches!(result, Err(TransferError::InvalidMetadata(_))));

        instance.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_reaches_broker_before_disconnect() {
        let (port, received) = fake_broker(0x00).await;
        let instance = Arc::new(
            MqttManager::from_config(local_config(port))
                .unwrap()
                .build_and_start()
                .await
                .unwrap(),
        );
        instance
            .wait_connected(Duration::from_secs(5))
            .await
            .unwrap();

        let publisher = Publisher::new(instance.clone());
        publisher
            .publish(
                &json!({"latency": 9.5}),
                &EndpointMetadata::retained("speedtest/state"),
            )
            .await
            .unwrap();
        instance.shutdown().await.unwrap();

        let bytes = received.await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let topic_at = text.find("speedtest/state").unwrap();
        let payload_at = text.find(r#"{"latency":9.5}"#).unwrap();
        assert!(topic_at < payload_at);
        // PUBLISH, QoS 0, retained.
        assert!(bytes.contains(&0x31));
        assert_eq!(&bytes[bytes.len() - 2..], &[0xE0, 0x00]);
    }
}
