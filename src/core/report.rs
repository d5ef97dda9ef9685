use speedtest_mqtt_transport::EndpointMetadata;
use tracing::info;

use super::{executor::Publisher, speedtest::MeasurementResult};
use crate::error::RunError;

/// Publishes a validated result to the state topic, QoS 0, not retained.
pub async fn publish_result(
    publisher: &dyn Publisher,
    base_topic: &str,
    result: &MeasurementResult,
) -> Result<(), RunError> {
    let meta = EndpointMetadata::at_most_once(base_topic);
    publisher
        .publish(result, &meta)
        .await
        .map_err(|e| RunError::publish_failed(base_topic, e))?;

    info!(
        "Published result to '{}': {:.2} ms, {:.2} Mbps down, {:.2} Mbps up",
        base_topic, result.latency, result.dl_speed, result.ul_speed
    );
    Ok(())
}
