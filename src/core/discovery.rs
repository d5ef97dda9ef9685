//! Home Assistant MQTT discovery.
//!
//! Announces three sensors (latency, download, upload) that all read from
//! the result state topic. Descriptors are retained so Home Assistant picks
//! them up whenever it (re)connects.

use serde::{Deserialize, Serialize};
use speedtest_mqtt_transport::EndpointMetadata;
use tracing::{debug, info, instrument};

use super::executor::Publisher;
use crate::{config::speedtest::TopicsConfig, error::RunError};

/// Discovery payload for one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub name: String,
    pub unit_of_measurement: String,
    pub state_topic: String,
    pub value_template: String,
}

struct SensorTemplate {
    suffix: &'static str,
    unit: &'static str,
    value_template: &'static str,
}

const SENSORS: [SensorTemplate; 3] = [
    SensorTemplate {
        suffix: "ping",
        unit: "ms",
        value_template: "{{ value_json.latency }}",
    },
    SensorTemplate {
        suffix: "download",
        unit: "Mbps",
        value_template: "{{ value_json.dl_speed }}",
    },
    SensorTemplate {
        suffix: "upload",
        unit: "Mbps",
        value_template: "{{ value_json.ul_speed }}",
    },
];

/// The three descriptors, in latency, download, upload order.
pub fn descriptors(topics: &TopicsConfig) -> Vec<SensorDescriptor> {
    SENSORS
        .iter()
        .map(|sensor| SensorDescriptor {
            name: format!("{}-{}", topics.sensor_name, sensor.suffix),
            unit_of_measurement: sensor.unit.to_string(),
            state_topic: topics.base_topic.clone(),
            value_template: sensor.value_template.to_string(),
        })
        .collect()
}

/// `<root>/sensor/<name>/config`
pub fn discovery_topic(root: &str, descriptor: &SensorDescriptor) -> String {
    format!("{}/sensor/{}/config", root, descriptor.name)
}

/// Publishes every descriptor, retained at QoS 0. Returns how many were
/// sent; zero when discovery is disabled.
#[instrument(skip_all, fields(root = %topics.discovery_root))]
pub async fn publish_discovery(
    publisher: &dyn Publisher,
    topics: &TopicsConfig,
) -> Result<usize, RunError> {
    if !topics.discovery_enabled() {
        debug!("Discovery root is empty, skipping discovery");
        return Ok(0);
    }

    let descriptors = descriptors(topics);
    for descriptor in &descriptors {
        let meta = EndpointMetadata::retained(discovery_topic(&topics.discovery_root, descriptor));
        publisher
            .publish(descriptor, &meta)
            .await
            .map_err(|e| RunError::publish_failed(&meta.topic, e))?;
        debug!("Announced sensor '{}' on {}", descriptor.name, meta.topic);
    }

    info!("Published {} discovery descriptors", descriptors.len());
    Ok(descriptors.len())
}
