//! HTTP measurement target speaking the speedtest.net server protocol.
//!
//! Every test resource lives next to the server's `upload.php`:
//! `latency.txt` for ping, `random<N>x<N>.jpg` for download, and the
//! upload endpoint itself for POSTs.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use futures_util::{future::try_join_all, StreamExt};
use reqwest::{header::CONTENT_TYPE, Response, Url};
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use super::{
    plan::{TransferMode, TransferPlan},
    types::{MeasurementResult, ServerInfo},
    SpeedtestError,
};

/// A server the runner can measure against.
///
/// Each phase records its metric in the target and also returns it.
#[async_trait]
pub trait MeasurementTarget: Send {
    fn info(&self) -> &ServerInfo;

    /// Minimum round-trip time in milliseconds.
    async fn ping_test(&mut self) -> Result<f64, SpeedtestError>;

    /// Download throughput in Mbps.
    async fn download_test(&mut self, mode: TransferMode) -> Result<f64, SpeedtestError>;

    /// Upload throughput in Mbps.
    async fn upload_test(&mut self, mode: TransferMode) -> Result<f64, SpeedtestError>;

    /// Server identity plus whatever phases have run so far.
    fn result(&self) -> MeasurementResult;
}

/// Turns the selected server into something measurable.
pub trait TargetFactory: Send + Sync {
    fn create(&self, server: ServerInfo) -> Result<Box<dyn MeasurementTarget>, SpeedtestError>;
}

pub struct HttpTargetFactory {
    client: reqwest::Client,
    plan: TransferPlan,
}

impl HttpTargetFactory {
    pub fn new(client: reqwest::Client, plan: TransferPlan) -> Self {
        Self { client, plan }
    }
}

impl TargetFactory for HttpTargetFactory {
    fn create(&self, server: ServerInfo) -> Result<Box<dyn MeasurementTarget>, SpeedtestError> {
        let target = HttpTarget::new(self.client.clone(), self.plan.clone(), server)?;
        Ok(Box::new(target))
    }
}

pub struct HttpTarget {
    client: reqwest::Client,
    plan: TransferPlan,
    upload_url: Url,
    result: MeasurementResult,
}

impl HttpTarget {
    pub fn new(
        client: reqwest::Client,
        plan: TransferPlan,
        server: ServerInfo,
    ) -> Result<Self, SpeedtestError> {
        let upload_url = Url::parse(&server.url)?;
        Ok(Self {
            client,
            plan,
            upload_url,
            result: MeasurementResult::pending(server),
        })
    }

    /// Resolves `name` in the directory that holds `upload.php`.
    fn resource(&self, name: &str) -> Result<Url, SpeedtestError> {
        Ok(self.upload_url.join(name)?)
    }

    async fn fetch(&self, url: Url) -> Result<u64, SpeedtestError> {
        let response = checked(self.client.get(url).send().await?)?;
        let mut body = response.bytes_stream();
        let mut received = 0u64;
        while let Some(chunk) = body.next().await {
            received += chunk?.len() as u64;
        }
        Ok(received)
    }

    async fn push(&self, len: usize) -> Result<u64, SpeedtestError> {
        let payload = upload_payload(len);
        let sent = payload.len() as u64;
        let response = self
            .client
            .post(self.upload_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(payload)
            .send()
            .await?;
        let mut response = checked(response)?;
        while response.chunk().await?.is_some() {}
        Ok(sent)
    }

    async fn download_batch(
        &self,
        size: u32,
        requests: usize,
        mode: TransferMode,
    ) -> Result<f64, SpeedtestError> {
        let url = self.resource(&format!("random{size}x{size}.jpg"))?;
        trace!("Downloading {} x {}", requests, url);
        timed_batch(requests, mode, || self.fetch(url.clone())).await
    }

    async fn upload_batch(
        &self,
        size_index: usize,
        requests: usize,
        mode: TransferMode,
    ) -> Result<f64, SpeedtestError> {
        let len = self.plan.upload_bytes(size_index);
        trace!("Uploading {} x {} bytes", requests, len);
        timed_batch(requests, mode, || self.push(len)).await
    }
}

#[async_trait]
impl MeasurementTarget for HttpTarget {
    fn info(&self) -> &ServerInfo {
        &self.result.server
    }

    #[instrument(skip(self), fields(server_id = self.result.server.id))]
    async fn ping_test(&mut self) -> Result<f64, SpeedtestError> {
        let url = self.resource("latency.txt")?;
        let mut best: Option<Duration> = None;

        for sample in 0..self.plan.ping_samples {
            let start = Instant::now();
            let mut response = checked(self.client.get(url.clone()).send().await?)?;
            while response.chunk().await?.is_some() {}
            let rtt = start.elapsed();
            trace!("Ping sample {}: {:?}", sample, rtt);
            best = Some(best.map_or(rtt, |b| b.min(rtt)));
        }

        let latency = best
            .map(|rtt| rtt.as_secs_f64() * 1000.0)
            .ok_or(SpeedtestError::EmptyMeasurement)?;
        debug!("Latency {:.2} ms", latency);
        self.result.latency = latency;
        Ok(latency)
    }

    #[instrument(skip(self), fields(server_id = self.result.server.id))]
    async fn download_test(&mut self, mode: TransferMode) -> Result<f64, SpeedtestError> {
        let warmup = self
            .download_batch(self.plan.download_warmup_size, self.plan.warmup_requests, mode)
            .await?;
        debug!("Download warm-up {:.2} Mbps", warmup);

        let speed = match self.plan.download_workload(mode, warmup) {
            Some(workload) => {
                let size = self.plan.download_size(workload.size_index);
                self.download_batch(size, workload.requests, mode).await?
            }
            None => warmup,
        };
        debug!("Download {:.2} Mbps", speed);
        self.result.dl_speed = speed;
        Ok(speed)
    }

    #[instrument(skip(self), fields(server_id = self.result.server.id))]
    async fn upload_test(&mut self, mode: TransferMode) -> Result<f64, SpeedtestError> {
        let warmup = self
            .upload_batch(self.plan.upload_warmup_index, self.plan.warmup_requests, mode)
            .await?;
        debug!("Upload warm-up {:.2} Mbps", warmup);

        let speed = match self.plan.upload_workload(mode, warmup) {
            Some(workload) => {
                self.upload_batch(workload.size_index, workload.requests, mode)
                    .await?
            }
            None => warmup,
        };
        debug!("Upload {:.2} Mbps", speed);
        self.result.ul_speed = speed;
        Ok(speed)
    }

    fn result(&self) -> MeasurementResult {
        self.result.clone()
    }
}

fn checked(response: Response) -> Result<Response, SpeedtestError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SpeedtestError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

/// Form body of exactly `len` bytes: `content1=` followed by filler.
fn upload_payload(len: usize) -> Vec<u8> {
    const PREFIX: &[u8] = b"content1=";
    let mut payload = Vec::with_capacity(len);
    payload.extend(PREFIX.iter().take(len));
    payload.resize(len, b'0');
    payload
}

/// Runs `requests` transfers, one after another in single mode and all at
/// once in multi mode, and converts the bytes moved into Mbps.
async fn timed_batch<F, Fut>(
    requests: usize,
    mode: TransferMode,
    transfer: F,
) -> Result<f64, SpeedtestError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<u64, SpeedtestError>>,
{
    let start = Instant::now();
    let bytes: u64 = match mode {
        TransferMode::Single => {
            let mut total = 0;
            for _ in 0..requests {
                total += transfer().await?;
            }
            total
        }
        TransferMode::Multi => try_join_all((0..requests).map(|_| transfer()))
            .await?
            .into_iter()
            .sum(),
    };
    mbps(bytes, start.elapsed())
}

/// `bytes × 8 / seconds / 10⁶`; an empty window is an error.
pub fn mbps(bytes: u64, elapsed: Duration) -> Result<f64, SpeedtestError> {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= 0.0 {
        return Err(SpeedtestError::EmptyMeasurement);
    }
    Ok(bytes as f64 * 8.0 / secs / 1_000_000.0)
}
