//! High-level MQTT manager for a single publish session.
//!
//! `MqttManager` builds the client, spawns the connection kernel and hands
//! back an `MqttInstance`. The instance is what applications use: wait for
//! the broker, publish, shut down.
//!
//! # Typical Usage
//!
//! ```ignore
//! let instance = MqttManager::from_config(config)?.build_and_start().await?;
//! instance.wait_connected(Duration::from_secs(30)).await?;
//! Publisher::new(instance.clone()).publish(&payload, &metadata).await?;
//! instance.shutdown().await?;
//! ```

use std::{sync::Arc, time::Duration};

use rumqttc::AsyncClient;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    client::ClientBuilder, config::Config, connection::ConnectionKernel, error::TransferError,
    state::ConnectionState,
};

type KernelHandle = JoinHandle<Result<(), TransferError>>;

/// Entry point for building an MQTT session.
pub struct MqttManager {
    config: Config,
}

impl MqttManager {
    pub fn from_config(config: Config) -> Result<Self, TransferError> {
        Ok(Self { config })
    }

    /// Builds the client and spawns the connection kernel.
    ///
    /// The connection is opened in the background. Use
    /// `MqttInstance::wait_connected` to know when the broker accepted it.
    pub async fn build_and_start(self) -> Result<MqttInstance, TransferError> {
        info!(
            "Connecting to MQTT broker {}:{} as '{}'",
            self.config.host, self.config.port, self.config.client_id
        );

        let (client, event_loop) = ClientBuilder::from_config(&self.config)?.build()?;

        let connection_cancel = CancellationToken::new();
        let kernel = ConnectionKernel::new(event_loop, connection_cancel.clone());
        let state_rx = kernel.subscribe_state();

        let handle = tokio::spawn(async move {
            let result = kernel.run().await;
            if let Err(e) = &result {
                error!("MQTT connection kernel exited with error: {}", e);
            }
            result
        });

        Ok(MqttInstance {
            client,
            state_rx,
            connection_cancel,
            kernel: Arc::new(Mutex::new(Some(handle))),
            shutdown_timeout: Duration::from_secs(self.config.connection_timeout),
        })
    }
}

/// An MQTT session ready for use.
///
/// Cheap to clone; all clones share the same connection.
#[derive(Debug, Clone)]
pub struct MqttInstance {
    client: AsyncClient,

    state_rx: watch::Receiver<ConnectionState>,

    /// Stops the kernel if DISCONNECT cannot be flushed in time.
    connection_cancel: CancellationToken,

    /// Taken by the first `shutdown` call.
    kernel: Arc<Mutex<Option<KernelHandle>>>,

    shutdown_timeout: Duration,
}

impl MqttInstance {
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    /// Returns the most recent connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Waits until the broker accepts the connection.
    ///
    /// # Returns
    /// - `Ok(())`: CONNACK received
    /// - `Err(TransferError::ConnectionKernel)`: the connection failed first
    /// - `Err(TransferError::ConnectTimeout)`: nothing happened within `timeout`
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), TransferError> {
        let mut state_rx = self.state_rx.clone();

        let waited = tokio::time::timeout(timeout, async {
            let state = match state_rx
                .wait_for(|s| s.is_connected() || s.is_terminal())
                .await
            {
                Ok(state) => state.clone(),
                Err(_) => {
                    return Err(TransferError::ConnectionKernel(
                        "connection kernel stopped".into(),
                    ))
                }
            };

            match state {
                ConnectionState::Disconnected(reason) => {
                    Err(TransferError::ConnectionKernel(reason))
                }
                _ => Ok(()),
            }
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => Err(TransferError::ConnectTimeout(timeout)),
        }
    }

    /// Sends DISCONNECT after everything queued before it and waits for the
    /// kernel to finish.
    ///
    /// Calling it more than once is harmless; only the first call waits.
    pub async fn shutdown(&self) -> Result<(), TransferError> {
        let Some(handle) = self.kernel.lock().await.take() else {
            debug!("MQTT session already shut down");
            return Ok(());
        };

        if handle.is_finished() {
            return join_kernel(handle).await;
        }

        if let Err(e) = self.client.disconnect().await {
            warn!("Error queueing disconnect packet: {:?}", e);
        }

        let mut handle = handle;
        match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
            Ok(joined) => flatten_join(joined),
            Err(_) => {
                warn!(
                    "DISCONNECT not flushed within {:?}, cancelling connection kernel",
                    self.shutdown_timeout
                );
                self.connection_cancel.cancel();
                join_kernel(handle).await?;
                Err(TransferError::ConnectTimeout(self.shutdown_timeout))
            }
        }
    }
}

async fn join_kernel(handle: KernelHandle) -> Result<(), TransferError> {
    flatten_join(handle.await)
}

fn flatten_join(
    joined: Result<Result<(), TransferError>, tokio::task::JoinError>,
) -> Result<(), TransferError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(TransferError::ConnectionKernel(format!(
            "connection kernel task failed: {e}"
        ))),
    }
}
