//! Connection kernel: drives the rumqttc event loop for one session.
//!
//! The kernel owns the `EventLoop` and polls it until the session ends,
//! broadcasting every `ConnectionState` transition on a watch channel.
//! There is no reconnection. The first connection error ends the kernel.
//!
//! ```text
//! MqttInstance ──publish──▶ AsyncClient ──requests──▶ EventLoop
//!                                                        │
//!                                      ConnectionKernel::run() polls
//!                                                        │
//!                                      watch::Sender<ConnectionState>
//! ```

use rumqttc::{ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{error::TransferError, state::ConnectionState};

/// Runs the MQTT event loop for a single session.
///
/// Intended to be moved into its own tokio task. The matching
/// `AsyncClient` stays with the caller and can be cloned freely.
pub struct ConnectionKernel {
    event_loop: EventLoop,

    /// Cancels polling without waiting for the broker.
    cancel: CancellationToken,

    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionKernel {
    pub fn new(event_loop: EventLoop, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            event_loop,
            cancel,
            state_tx,
        }
    }

    /// Returns a receiver that sees the current state and every change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Broadcasts `state` if it differs from the current one.
    fn update_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });

        if changed {
            info!("Connection state changed to: {}", state);
        }
    }

    /// Polls the event loop until the session ends.
    ///
    /// # Returns
    /// - `Ok(())`: the client sent DISCONNECT, or polling was cancelled
    /// - `Err(TransferError)`: the connection failed or was refused
    pub async fn run(mut self) -> Result<(), TransferError> {
        self.update_state(ConnectionState::Connecting);
        info!("Starting connection event loop...");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!("Connection kernel cancelled before a clean disconnect");
                    self.update_state(ConnectionState::Disconnected("cancelled".into()));
                    return Ok(());
                }

                event_result = self.event_loop.poll() => {
                    match event_result {
                        Ok(event) => {
                            if self.handle_event(event) {
                                info!("Connection kernel shutdown completed");
                                return Ok(());
                            }
                        }
                        Err(e) => {
                            let reason = describe_connection_error(&e);
                            error!("Connection error: {}", reason);
                            debug!("Connection error details: {e:?}");
                            self.update_state(ConnectionState::Disconnected(reason));
                            return Err(TransferError::from(e));
                        }
                    }
                }
            }
        }
    }

    /// Applies a single event. Returns true when the session is over.
    fn handle_event(&self, event: Event) -> bool {
        match event {
            Event::Incoming(Packet::ConnAck(conn_ack)) => {
                if conn_ack.code == ConnectReturnCode::Success {
                    info!("Connection established successfully.");
                    self.update_state(ConnectionState::Connected);
                }
                false
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("Disconnected by broker");
                self.update_state(ConnectionState::Disconnected(
                    "Disconnected by broker".into(),
                ));
                true
            }
            Event::Incoming(packet) => {
                trace!("Incoming packet: {:?}", packet);
                false
            }
            Event::Outgoing(Outgoing::Disconnect) => {
                debug!("DISCONNECT flushed to broker");
                self.update_state(ConnectionState::Disconnected(
                    "Disconnected by client".into(),
                ));
                true
            }
            Event::Outgoing(outgoing) => {
                trace!("Outgoing packet: {:?}", outgoing);
                false
            }
        }
    }
}

/// Produces a readable reason for a connection failure.
///
/// Refusals name the return code; other errors report their innermost
/// source, which is where the useful text usually lives.
fn describe_connection_error(err: &ConnectionError) -> String {
    match err {
        ConnectionError::ConnectionRefused(code) => format!("connection refused: {code:?}"),
        other => root_cause(other),
    }
}

fn root_cause(e: &dyn std::error::Error) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string().trim_matches('"').to_string()
}
