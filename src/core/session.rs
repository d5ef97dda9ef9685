//! Broker session around one measurement run.
//!
//! The session is opened before the pipeline starts and always closed
//! afterwards, also when the run fails or is interrupted. A run only counts
//! as successful once DISCONNECT went out after every queued publish.

use std::{future::Future, sync::Arc, time::Duration};

use speedtest_mqtt_transport::{MqttInstance, MqttManager, Publisher as MqttPublisher};
use tracing::{debug, info, warn};

use super::{
    executor::{Executor, Publisher},
    speedtest::{http_client, HttpTargetFactory, MeasurementResult, SpeedtestNetDirectory, TransferPlan},
};
use crate::{config::Config, error::RunError};

/// Connects, runs the pipeline against speedtest.net and disconnects.
///
/// When `interrupt` resolves first the measurement is dropped and the
/// session is closed before `Interrupted` is returned.
pub async fn run(
    cfg: &Config,
    interrupt: impl Future<Output = ()>,
) -> Result<MeasurementResult, RunError> {
    let client = http_client(Duration::from_secs(cfg.speedtest.timeout_secs))
        .map_err(RunError::DirectoryUnavailable)?;

    let instance = MqttManager::from_config(cfg.transport.clone())
        .map_err(RunError::ConnectFailed)?
        .build_and_start()
        .await
        .map_err(RunError::ConnectFailed)?;

    let publisher = Arc::new(MqttPublisher::new(Arc::new(instance.clone()))) as Arc<dyn Publisher>;
    let directory = Arc::new(SpeedtestNetDirectory::new(
        client.clone(),
        cfg.speedtest.server_limit,
    ));
    let targets = Arc::new(HttpTargetFactory::new(client, TransferPlan::default()));
    let executor = Executor::new(
        publisher,
        directory,
        targets,
        cfg.topics.clone(),
        &cfg.speedtest,
    );

    within_session(
        &instance,
        Duration::from_secs(cfg.transport.connection_timeout),
        &cfg.topics.base_topic,
        executor.run(),
        interrupt,
    )
    .await
}

/// Waits for CONNACK, runs `work`, then shuts the session down.
///
/// The first failure wins. A failed shutdown after successful work is
/// `PublishFailed` on `base_topic`: queued messages may not have left.
pub async fn within_session<T, W, I>(
    instance: &MqttInstance,
    connect_timeout: Duration,
    base_topic: &str,
    work: W,
    interrupt: I,
) -> Result<T, RunError>
where
    W: Future<Output = Result<T, RunError>>,
    I: Future<Output = ()>,
{
    let connected_work = async {
        instance
            .wait_connected(connect_timeout)
            .await
            .map_err(RunError::ConnectFailed)?;
        info!("Connected to MQTT broker");
        work.await
    };

    let outcome = tokio::select! {
        outcome = connected_work => outcome,
        _ = interrupt => {
            warn!("Interrupted, closing the MQTT session");
            Err(RunError::Interrupted)
        }
    };

    let closed = instance.shutdown().await;
    let value = match outcome {
        Ok(value) => value,
        Err(e) => {
            if let Err(close_err) = closed {
                debug!("MQTT session closed with error after failed run: {}", close_err);
            }
            return Err(e);
        }
    };

    closed.map_err(|e| RunError::publish_failed(base_topic, Box::new(e)))?;
    info!("MQTT session closed");
    Ok(value)
}
