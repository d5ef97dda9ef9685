//! Drives the three measurement phases in order.

use tracing::{info, instrument};

use super::{plan::TransferMode, server::MeasurementTarget, types::MeasurementResult};
use crate::error::RunError;

pub struct MeasurementRunner {
    mode: TransferMode,
}

impl MeasurementRunner {
    pub fn new(mode: TransferMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Ping, then download, then upload. The first failing phase ends the
    /// run; later phases never start.
    #[instrument(skip_all, fields(server_id = target.info().id, mode = self.mode.as_str()))]
    pub async fn run(&self, target: &mut dyn MeasurementTarget) -> Result<MeasurementResult, RunError> {
        let server_id = target.info().id;

        let latency = target
            .ping_test()
            .await
            .map_err(|source| RunError::PingFailed { server_id, source })?;
        info!("Ping: {:.2} ms", latency);

        let download = target
            .download_test(self.mode)
            .await
            .map_err(|source| RunError::DownloadFailed { server_id, source })?;
        info!("Download: {:.2} Mbps", download);

        let upload = target
            .upload_test(self.mode)
            .await
            .map_err(|source| RunError::UploadFailed { server_id, source })?;
        info!("Upload: {:.2} Mbps", upload);

        Ok(target.result())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::core::speedtest::{
        types::{tests::sample_server, ServerInfo},
        SpeedtestError,
    };

    /// Phase a `FakeTarget` should fail in.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub(crate) enum Phase {
        Ping,
        Download,
        Upload,
    }

    /// Records every phase call; fails in `fail_at` if set.
    pub(crate) struct FakeTarget {
        pub result: MeasurementResult,
        pub calls: Arc<Mutex<Vec<&'static str>>>,
        pub fail_at: Option<Phase>,
        pub metrics: (f64, f64, f64),
    }

    impl FakeTarget {
        pub(crate) fn new(server: ServerInfo) -> Self {
            Self {
                result: MeasurementResult::pending(server),
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_at: None,
                metrics: (12.5, 93.75, 41.0),
            }
        }

        fn step(&mut self, phase: Phase, name: &'static str) -> Result<(), SpeedtestError> {
            self.calls.lock().unwrap().push(name);
            if self.fail_at == Some(phase) {
                return Err(SpeedtestError::Status {
                    url: format!("http://fake/{name}"),
                    status: 500,
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MeasurementTarget for FakeTarget {
        fn info(&self) -> &ServerInfo {
            &self.result.server
        }

        async fn ping_test(&mut self) -> Result<f64, SpeedtestError> {
            self.step(Phase::Ping, "ping")?;
            self.result.latency = self.metrics.0;
            Ok(self.metrics.0)
        }

        async fn download_test(&mut self, _mode: TransferMode) -> Result<f64, SpeedtestError> {
            self.step(Phase::Download, "download")?;
            self.result.dl_speed = self.metrics.1;
            Ok(self.metrics.1)
        }

        async fn upload_test(&mut self, _mode: TransferMode) -> Result<f64, SpeedtestError> {
            self.step(Phase::Upload, "upload")?;
            self.result.ul_speed = self.metrics.2;
            Ok(self.metrics.2)
        }

        fn result(&self) -> MeasurementResult {
            self.result.clone()
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_phases_run_in_order() {
        let mut target = FakeTarget::new(sample_server(5));
        let calls = target.calls.clone();

        let result = MeasurementRunner::new(TransferMode::Single)
            .run(&mut target)
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["ping", "download", "upload"]);
        assert_eq!(result.latency, 12.5);
        assert_eq!(result.dl_speed, 93.75);
        assert_eq!(result.ul_speed, 41.0);
        assert_eq!(result.server.id, 5);
        assert!(logs_contain("Download: 93.75 Mbps"));
    }

    #[tokio::test]
    async fn test_multi_mode_keeps_phase_order() {
        let mut target = FakeTarget::new(sample_server(5));
        let calls = target.calls.clone();

        MeasurementRunner::new(TransferMode::Multi)
            .run(&mut target)
            .await
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["ping", "download", "upload"]);
    }

    #[tokio::test]
    async fn test_download_failure_skips_upload() {
        let mut target = FakeTarget::new(sample_server(8));
        target.fail_at = Some(Phase::Download);
        let calls = target.calls.clone();

        let err = MeasurementRunner::new(TransferMode::Single)
            .run(&mut target)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::DownloadFailed { server_id: 8, .. }));
        assert_eq!(*calls.lock().unwrap(), vec!["ping", "download"]);
    }

    #[tokio::test]
    async fn test_ping_failure_stops_everything() {
        let mut target = FakeTarget::new(sample_server(8));
        target.fail_at = Some(Phase::Ping);
        let calls = target.calls.clone();

        let err = MeasurementRunner::new(TransferMode::Single)
            .run(&mut target)
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 6);
        assert_eq!(*calls.lock().unwrap(), vec!["ping"]);
    }

    #[tokio::test]
    async fn test_upload_failure_is_tagged() {
        let mut target = FakeTarget::new(sample_server(3));
        target.fail_at = Some(Phase::Upload);

        let err = MeasurementRunner::new(TransferMode::Single)
            .run(&mut target)
            .await
            .unwrap_err();
        assert_eq!(err.phase(), "upload");
    }
}
