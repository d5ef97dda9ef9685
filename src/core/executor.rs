//! One-shot measurement pipeline.
//!
//! The `Executor` announces the sensors, picks a server, runs the three
//! phases, validates the outcome and publishes it. Any failure ends the run;
//! nothing is retried and nothing partial is published.

use std::sync::Arc;

use erased_serde::Serialize;
use speedtest_mqtt_transport::{EndpointMetadata, Publisher as MqttPublisher};
use tracing::{info, instrument};

use super::{
    discovery::publish_discovery,
    report::publish_result,
    speedtest::{
        Directory, EndpointSelector, MeasurementResult, MeasurementRunner, TargetFactory,
        TransferMode,
    },
    validation::validate_result,
};
use crate::{
    config::speedtest::{SpeedtestConfig, TopicsConfig},
    error::{PublishError, RunError},
};

/// Anything that can put a serializable payload on a topic.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes serialized data to the destination defined in metadata.
    async fn publish(
        &self,
        data: &(dyn Serialize + Send + Sync),
        meta: &EndpointMetadata,
    ) -> Result<(), PublishError>;
}

#[async_trait::async_trait]
impl Publisher for MqttPublisher {
    async fn publish(
        &self,
        data: &(dyn Serialize + Send + Sync),
        meta: &EndpointMetadata,
    ) -> Result<(), PublishError> {
        MqttPublisher::publish(self, data, meta)
            .await
            .map_err(|e| Box::new(e) as _)
    }
}

pub struct Executor {
    publisher: Arc<dyn Publisher>,
    selector: EndpointSelector,
    targets: Arc<dyn TargetFactory>,
    runner: MeasurementRunner,
    topics: TopicsConfig,
}

impl Executor {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        directory: Arc<dyn Directory>,
        targets: Arc<dyn TargetFactory>,
        topics: TopicsConfig,
        speedtest: &SpeedtestConfig,
    ) -> Self {
        Self {
            publisher,
            selector: EndpointSelector::new(directory, speedtest.server_ids.clone()),
            targets,
            runner: MeasurementRunner::new(TransferMode::from_flag(speedtest.multi_connection)),
            topics,
        }
    }

    /// Runs the pipeline once and returns the published result.
    #[instrument(skip(self), fields(mode = self.runner.mode().as_str()))]
    pub async fn run(&self) -> Result<MeasurementResult, RunError> {
        publish_discovery(self.publisher.as_ref(), &self.topics).await?;

        let server = self.selector.select().await?;
        let server_id = server.id;

        let mut target = self
            .targets
            .create(server)
            .map_err(|source| RunError::PingFailed { server_id, source })?;
        let result = self.runner.run(target.as_mut()).await?;

        validate_result(&result)?;
        publish_result(self.publisher.as_ref(), &self.topics.base_topic, &result).await?;

        info!("Speedtest against server {} complete", server_id);
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use erased_serde::Serialize;
    use tracing_test::traced_test;

    use super::*;
    use crate::core::speedtest::{
        runner::tests::{FakeTarget, Phase},
        selector::tests::FakeDirectory,
        types::{tests::sample_server, ServerInfo},
        MeasurementTarget, SpeedtestError,
    };

    #[derive(Debug, Clone)]
    struct Sent {
        topic: String,
        retain: bool,
        json: String,
    }

    #[derive(Default)]
    struct MockPublisher {
        sent: Mutex<Vec<Sent>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Publisher for MockPublisher {
        async fn publish(
            &self,
            data: &(dyn Serialize + Send + Sync),
            meta: &EndpointMetadata,
        ) -> Result<(), PublishError> {
            if self.fail {
                return Err("broker queue closed".into());
            }
            let json = serde_json::to_string(data).unwrap();
            self.sent.lock().unwrap().push(Sent {
                topic: meta.topic.clone(),
                retain: meta.retain,
                json,
            });
            Ok(())
        }
    }

    impl MockPublisher {
        fn publish_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    /// Hands out `FakeTarget`s sharing one call log.
    pub(crate) struct FakeTargets {
        calls: Arc<Mutex<Vec<&'static str>>>,
        fail_at: Option<Phase>,
        metrics: (f64, f64, f64),
    }

    impl FakeTargets {
        pub(crate) fn healthy() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_at: None,
                metrics: (12.5, 93.75, 41.0),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TargetFactory for FakeTargets {
        fn create(&self, server: ServerInfo) -> Result<Box<dyn MeasurementTarget>, SpeedtestError> {
            let mut target = FakeTarget::new(server);
            target.calls = self.calls.clone();
            target.fail_at = self.fail_at;
            target.metrics = self.metrics;
            Ok(Box::new(target))
        }
    }

    fn executor(
        publisher: Arc<MockPublisher>,
        servers: Vec<ServerInfo>,
        targets: Arc<FakeTargets>,
        topics: TopicsConfig,
    ) -> Executor {
        Executor::new(
            publisher,
            Arc::new(FakeDirectory::with(servers)),
            targets,
            topics,
            &SpeedtestConfig::default(),
        )
    }

    fn no_discovery() -> TopicsConfig {
        TopicsConfig {
            discovery_root: String::new(),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn executor_publishes_discovery_then_result() {
        let publisher = Arc::new(MockPublisher::default());
        let targets = Arc::new(FakeTargets::healthy());
        let executor = executor(
            publisher.clone(),
            vec![sample_server(11), sample_server(12)],
            targets.clone(),
            TopicsConfig::default(),
        );

        let result = executor.run().await.unwrap();
        assert_eq!(result.server.id, 11);

        let sent = publisher.sent();
        let topics: Vec<&str> = sent.iter().map(|s| s.topic.as_str()).collect();
        assert_eq!(
            topics,
            vec![
                "homeassistant/sensor/speedtest-ping/config",
                "homeassistant/sensor/speedtest-download/config",
                "homeassistant/sensor/speedtest-upload/config",
                "speedtest",
            ]
        );
        assert!(sent[..3].iter().all(|s| s.retain));
        assert!(!sent[3].retain);
        assert!(sent[3].json.contains("\"dl_speed\":93.75"));
        assert!(sent[3].json.contains("\"id\":11"));

        assert_eq!(targets.calls(), vec!["ping", "download", "upload"]);
        assert!(logs_contain("Speedtest against server 11 complete"));
    }

    #[tokio::test]
    async fn executor_without_discovery_root_publishes_only_result() {
        let publisher = Arc::new(MockPublisher::default());
        let executor = executor(
            publisher.clone(),
            vec![sample_server(11)],
            Arc::new(FakeTargets::healthy()),
            no_discovery(),
        );

        executor.run().await.unwrap();

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "speedtest");
    }

    #[tokio::test]
    async fn executor_no_candidates_runs_no_phase() {
        let publisher = Arc::new(MockPublisher::default());
        let targets = Arc::new(FakeTargets::healthy());
        let executor = executor(
            publisher.clone(),
            vec![],
            targets.clone(),
            TopicsConfig::default(),
        );

        let err = executor.run().await.unwrap_err();
        assert!(matches!(err, RunError::NoEndpointAvailable { .. }));
        assert!(targets.calls().is_empty());
        assert!(publisher.sent().iter().all(|s| s.topic != "speedtest"));
    }

    #[tokio::test]
    async fn executor_withholds_invalid_result() {
        let publisher = Arc::new(MockPublisher::default());
        let targets = Arc::new(FakeTargets {
            metrics: (12.5, 93.75, 0.0),
            ..FakeTargets::healthy()
        });
        let executor = executor(
            publisher.clone(),
            vec![sample_server(11)],
            targets,
            no_discovery(),
        );

        let err = executor.run().await.unwrap_err();
        assert!(matches!(err, RunError::InvalidMeasurementResult(_)));
        assert_eq!(publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn executor_download_failure_prevents_upload() {
        let publisher = Arc::new(MockPublisher::default());
        let targets = Arc::new(FakeTargets {
            fail_at: Some(Phase::Download),
            ..FakeTargets::healthy()
        });
        let executor = executor(
            publisher.clone(),
            vec![sample_server(11)],
            targets.clone(),
            no_discovery(),
        );

        let err = executor.run().await.unwrap_err();
        assert_eq!(err.exit_code(), 7);
        assert_eq!(targets.calls(), vec!["ping", "download"]);
        assert_eq!(publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn executor_reports_publish_failure() {
        let publisher = Arc::new(MockPublisher {
            fail: true,
            ..Default::default()
        });
        let targets = Arc::new(FakeTargets::healthy());
        let executor = executor(
            publisher,
            vec![sample_server(11)],
            targets.clone(),
            TopicsConfig::default(),
        );

        let err = executor.run().await.unwrap_err();
        match err {
            RunError::PublishFailed { topic, .. } => {
                assert_eq!(topic, "homeassistant/sensor/speedtest-ping/config")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(targets.calls().is_empty());
    }

    #[tokio::test]
    async fn executor_honours_server_filter() {
        let publisher = Arc::new(MockPublisher::default());
        let executor = Executor::new(
            publisher.clone(),
            Arc::new(FakeDirectory::with(vec![sample_server(1), sample_server(2)])),
            Arc::new(FakeTargets::healthy()),
            no_discovery(),
            &SpeedtestConfig {
                server_ids: vec![2],
                ..Default::default()
            },
        );

        let result = executor.run().await.unwrap();
        assert_eq!(result.server.id, 2);
        assert!(publisher.sent()[0].json.contains("\"id\":2"));
    }
}
