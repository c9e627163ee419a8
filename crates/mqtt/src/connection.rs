//! Connection kernel: event loop driving, reconnection, state broadcast.
//!
//! The kernel owns the `rumqttc` event loop. It pumps MQTT events, classifies
//! failures into fatal and transient, sleeps out the backoff schedule on
//! transient ones, and publishes every state transition over a watch channel.
//! Everything else in the system observes the connection through that
//! channel; nothing else touches the event loop.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Packet};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{backoff::Backoff, config::Config, error::TransferError, state::ConnectionState};

/// Drives the MQTT event loop and keeps the connection alive.
///
/// Runs on a single task via [`ConnectionKernel::run`]; the associated
/// `AsyncClient` may be cloned freely into other tasks.
pub struct ConnectionKernel {
    client: AsyncClient,
    event_loop: EventLoop,
    is_connected: Arc<AtomicBool>,
    backoff: Mutex<Backoff>,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionKernel {
    /// Creates a kernel with the backoff schedule taken from `config`
    /// (`reconnect_delay`, `reconnect_backoff_multiplier`,
    /// `max_reconnect_attempts`).
    pub fn new(
        client: AsyncClient,
        event_loop: EventLoop,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        let mut backoff = Backoff::new(
            Duration::from_secs(config.reconnect_delay),
            Duration::from_secs(60),
            config.reconnect_backoff_multiplier,
        );
        if config.max_reconnect_attempts > 0 {
            backoff.set_max_attempts(config.max_reconnect_attempts);
        }

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        Self {
            client,
            event_loop,
            is_connected: Arc::new(AtomicBool::new(false)),
            backoff: Mutex::new(backoff),
            cancel,
            state_tx,
            state_rx,
        }
    }

    /// Returns a receiver observing connection state transitions. The
    /// current state is visible immediately on subscription.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Shared flag mirroring the `Connected` state, for callers that want a
    /// cheap check without a channel.
    pub fn is_connected(&self) -> Arc<AtomicBool> {
        self.is_connected.clone()
    }

    async fn update_state(&mut self, state: ConnectionState) {
        let changed = *self.state_tx.borrow() != state;
        if changed {
            if self.state_tx.send(state.clone()).is_err() {
                warn!("No subscribers for connection state updates");
            } else {
                info!("Connection state changed to: {}", state);
            }
        }
    }

    /// Runs the event loop until cancellation, a fatal error, or backoff
    /// exhaustion.
    ///
    /// Transient failures sleep out the next backoff delay and retry; a
    /// successful CONNACK resets the schedule. On a fatal failure the
    /// terminal `Disconnected` state is broadcast before returning, so
    /// observers blocked on the watch channel always learn why the kernel
    /// stopped.
    pub async fn run(&mut self) -> Result<(), TransferError> {
        self.update_state(ConnectionState::Connecting).await;
        self.backoff.lock().await.reset();

        info!("Starting connection event loop...");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received, closing broker connection...");
                    self.is_connected.store(false, Ordering::Release);
                    self.disconnect().await;
                    info!("Connection kernel stopped");
                    return Ok(());
                }

                event_result = self.event_loop.poll() => {
                    match event_result {
                        Ok(event) => self.handle_event(event).await,
                        Err(e) if is_fatal_error(&e) => {
                            error!("Fatal broker error, giving up: {}", root_cause(&e));
                            debug!("Fatal broker error detail: {e:?}");
                            self.is_connected.store(false, Ordering::Release);
                            self.update_state(ConnectionState::Disconnected(e.to_string())).await;
                            return Err(TransferError::from(e));
                        }
                        Err(e) => {
                            self.is_connected.store(false, Ordering::Release);
                            let next_delay = self.backoff.lock().await.next_sleep();
                            match next_delay {
                                Ok(delay) => {
                                    warn!(
                                        "Reconnecting in {:.2} seconds after error: {}",
                                        delay.as_secs_f64(),
                                        root_cause(&e)
                                    );
                                    self.update_state(ConnectionState::Reconnecting(delay.as_secs_f64())).await;
                                    tokio::time::sleep(delay).await;
                                }
                                Err(exhausted) => {
                                    error!("Reconnect attempts exhausted: {}", exhausted);
                                    self.update_state(ConnectionState::Disconnected(exhausted.to_string())).await;
                                    return Err(TransferError::RetriesPolicy(exhausted));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(packet) => match packet {
                Packet::ConnAck(conn_ack) => {
                    if conn_ack.code == ConnectReturnCode::Success {
                        info!("Broker connection established");
                        self.is_connected.store(true, Ordering::Release);
                        self.update_state(ConnectionState::Connected).await;
                        self.backoff.lock().await.reset();
                    }
                }
                Packet::Disconnect => {
                    warn!("Disconnected by broker");
                    self.is_connected.store(false, Ordering::Release);
                    self.update_state(ConnectionState::Disconnected(
                        "Disconnected by broker".into(),
                    ))
                    .await;
                }
                other => trace!("Incoming packet: {:?}", other),
            },
            Event::Outgoing(outgoing) => trace!("Outgoing packet: {:?}", outgoing),
        }
    }

    // Best effort; the socket is going away either way.
    async fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("Error sending disconnect packet: {:?}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Fatal,
    Reconnect,
}

fn classify_connection_error(err: &ConnectionError) -> Disposition {
    use Disposition::*;

    match err {
        // Broken crypto setup, protocol violations, or a spent request
        // queue will not heal by retrying.
        ConnectionError::Tls(_) => Fatal,
        ConnectionError::MqttState(_) => Fatal,
        ConnectionError::NotConnAck(_) => Fatal,
        ConnectionError::RequestsDone => Fatal,

        ConnectionError::Io(e) => match e.kind() {
            // Local misconfiguration rather than a transient condition.
            std::io::ErrorKind::AddrInUse
            | std::io::ErrorKind::PermissionDenied
            | std::io::ErrorKind::InvalidInput
            | std::io::ErrorKind::InvalidData => Fatal,
            _ => Reconnect,
        },

        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => Reconnect,

        ConnectionError::ConnectionRefused(code) => match code {
            ConnectReturnCode::RefusedProtocolVersion
            | ConnectReturnCode::BadClientId
            | ConnectReturnCode::BadUserNamePassword
            | ConnectReturnCode::NotAuthorized => Fatal,
            ConnectReturnCode::ServiceUnavailable => Reconnect,
            _ => Reconnect,
        },

        #[allow(unreachable_patterns)]
        _ => Reconnect,
    }
}

fn is_fatal_error(err: &ConnectionError) -> bool {
    matches!(classify_connection_error(err), Disposition::Fatal)
}

/// Innermost message of an error chain, quotes stripped.
fn root_cause(e: &dyn std::error::Error) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string().trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::{super::client::ClientBuilder, *};

    fn test_kernel(config: &Config) -> ConnectionKernel {
        let (client, event_loop) = ClientBuilder::from_config(config).unwrap().build().unwrap();
        ConnectionKernel::new(client, event_loop, config, CancellationToken::new())
    }

    #[tokio::test]
    async fn initial_state_is_connecting() {
        let kernel = test_kernel(&Config::default());
        assert_eq!(*kernel.subscribe_state().borrow(), ConnectionState::Connecting);
        assert!(!kernel.is_connected().load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn state_updates_reach_subscribers() {
        let mut kernel = test_kernel(&Config::default());
        let mut state_rx = kernel.subscribe_state();

        kernel.update_state(ConnectionState::Connected).await;

        state_rx.changed().await.unwrap();
        assert_eq!(*state_rx.borrow(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn backoff_honors_configured_attempt_cap() {
        let config = Config {
            max_reconnect_attempts: 2,
            ..Default::default()
        };
        let kernel = test_kernel(&config);

        let mut backoff = kernel.backoff.lock().await;
        assert!(backoff.next_sleep().is_ok());
        assert!(backoff.next_sleep().is_ok());
        assert!(backoff.next_sleep().is_err());
    }

    #[test]
    fn io_errors_classify_by_kind() {
        use std::io;

        let transient = ConnectionError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(!is_fatal_error(&transient));

        let fatal = ConnectionError::Io(io::Error::new(io::ErrorKind::AddrInUse, "address in use"));
        assert!(is_fatal_error(&fatal));
    }

    #[test]
    fn refused_credentials_are_fatal() {
        let refused = ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword);
        assert!(is_fatal_error(&refused));

        let unavailable = ConnectionError::ConnectionRefused(ConnectReturnCode::ServiceUnavailable);
        assert!(!is_fatal_error(&unavailable));
    }

    #[test]
    fn timeouts_are_transient() {
        assert!(!is_fatal_error(&ConnectionError::NetworkTimeout));
        assert!(!is_fatal_error(&ConnectionError::FlushTimeout));
    }
}
