//! Device detection: the event source side of the bridge.
//!
//! [`DetectionSource`] is the seam the orchestrator wires buttons through:
//! registering a hardware address yields a stream of zero-payload signals,
//! one per observed broadcast. Retransmissions arrive as duplicate signals
//! by design; collapsing them is the debounce controller's job, not this
//! module's.
//!
//! The production implementation is [`ProbeListener`], a UDP socket watching
//! for the DHCP DISCOVER broadcast the buttons emit on wake. Broadcasts from
//! devices outside the registered set are expected background noise and are
//! dropped with a debug log.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{buttons::normalize_address, listener::ListenerConfig};

pub mod bootp;

/// Errors raised by detection sources.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The address already has a registered stream.
    #[error("Device already registered: {0}")]
    AlreadyRegistered(String),

    /// Socket setup or receive failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of detection signals, one stream per registered device.
#[async_trait::async_trait]
pub trait DetectionSource: Send + Sync {
    /// Registers a hardware address and returns its signal stream. Each
    /// received unit is one observed broadcast; duplicates are expected.
    async fn register(&self, address: &str) -> Result<mpsc::Receiver<()>, DetectError>;
}

type Registry = Arc<RwLock<HashMap<String, mpsc::Sender<()>>>>;

/// UDP listener for button wake broadcasts.
///
/// Binds the configured address (port 67 by default, where DHCP DISCOVER
/// broadcasts land), parses each datagram as a BOOTP request, and forwards a
/// signal to the channel registered for the sender's hardware address.
pub struct ProbeListener {
    bind: String,
    channel_depth: usize,
    registry: Registry,
    cancel: CancellationToken,
}

impl ProbeListener {
    pub fn new(config: &ListenerConfig, cancel: CancellationToken) -> Self {
        Self {
            bind: config.bind.clone(),
            channel_depth: config.channel_depth,
            registry: Arc::new(RwLock::new(HashMap::new())),
            cancel,
        }
    }

    /// Runs the receive loop until cancellation.
    ///
    /// Binding failure is returned to the caller (fatal at startup); receive
    /// errors afterwards are logged and the loop keeps going.
    pub async fn run(&self) -> Result<(), DetectError> {
        let socket = UdpSocket::bind(&self.bind).await?;
        socket.set_broadcast(true)?;
        info!("Probe listener bound to {}", self.bind);

        let mut buf = [0u8; 1500];
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Probe listener stopped");
                    return Ok(());
                }
                received = socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            match bootp::client_hardware_address(&buf[..len]) {
                                Some(address) => {
                                    trace!("Probe from {} ({} bytes, {})", address, len, peer);
                                    dispatch(&self.registry, &address).await;
                                }
                                None => trace!("Ignoring non-probe datagram from {}", peer),
                            }
                        }
                        Err(e) => warn!("Probe receive error: {}", e),
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl DetectionSource for ProbeListener {
    async fn register(&self, address: &str) -> Result<mpsc::Receiver<()>, DetectError> {
        let address = normalize_address(address);
        let mut registry = self.registry.write().await;

        if registry.contains_key(&address) {
            return Err(DetectError::AlreadyRegistered(address));
        }

        let (tx, rx) = mpsc::channel(self.channel_depth);
        registry.insert(address.clone(), tx);
        debug!("Registered device {}", address);
        Ok(rx)
    }
}

/// Forwards one signal to the stream registered for `address`, if any.
///
/// Unregistered addresses are background traffic, logged at debug level and
/// dropped — never an error. A full channel drops the signal too; the
/// debounce window absorbs retransmission bursts regardless.
async fn dispatch(registry: &Registry, address: &str) {
    let registry = registry.read().await;
    match registry.get(address) {
        Some(tx) => match tx.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("Signal channel full for {}, dropping", address)
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("Signal channel closed for {}", address)
            }
        },
        None => debug!("Ignoring probe from unconfigured device {}", address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(depth: usize) -> ProbeListener {
        let config = ListenerConfig {
            bind: "127.0.0.1:0".into(),
            channel_depth: depth,
        };
        ProbeListener::new(&config, CancellationToken::new())
    }

    #[tokio::test]
    async fn registered_device_receives_signal() {
        let listener = listener(4);
        let mut rx = listener.register("AC:63:BE:2A:11:B0").await.unwrap();

        dispatch(&listener.registry, "ac:63:be:2a:11:b0").await;
        assert_eq!(rx.recv().await, Some(()));
    }

    #[tokio::test]
    async fn unknown_device_is_ignored() {
        let listener = listener(4);
        let mut rx = listener.register("ac:63:be:2a:11:b0").await.unwrap();

        dispatch(&listener.registry, "00:00:00:00:00:01").await;

        // Nothing may arrive on the registered stream.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let listener = listener(4);
        listener.register("ac:63:be:2a:11:b0").await.unwrap();

        let second = listener.register("AC-63-BE-2A-11-B0").await;
        assert!(matches!(second, Err(DetectError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn retransmissions_queue_up_to_depth() {
        let listener = listener(2);
        let mut rx = listener.register("ac:63:be:2a:11:b0").await.unwrap();

        for _ in 0..5 {
            dispatch(&listener.registry, "ac:63:be:2a:11:b0").await;
        }

        // Two queued, the overflow dropped silently.
        assert_eq!(rx.recv().await, Some(()));
        assert_eq!(rx.recv().await, Some(()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn end_to_end_datagram_to_signal() {
        let config = ListenerConfig {
            bind: "127.0.0.1:0".into(),
            channel_depth: 4,
        };
        let cancel = CancellationToken::new();

        // Bind manually so the test knows the ephemeral port.
        let socket = UdpSocket::bind(&config.bind).await.unwrap();
        let local = socket.local_addr().unwrap();
        drop(socket);

        let listener = Arc::new(ProbeListener::new(
            &ListenerConfig {
                bind: local.to_string(),
                channel_depth: 4,
            },
            cancel.clone(),
        ));
        let mut rx = listener.register("ac:63:be:2a:11:b0").await.unwrap();

        let run_handle = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run().await })
        };

        // Give the listener a moment to bind, then send a DISCOVER.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut frame = vec![0u8; 236];
        frame[0] = 1;
        frame[1] = 1;
        frame[2] = 6;
        frame[28..34].copy_from_slice(&[0xac, 0x63, 0xbe, 0x2a, 0x11, 0xb0]);
        sender.send_to(&frame, local).await.unwrap();

        assert_eq!(rx.recv().await, Some(()));

        cancel.cancel();
        run_handle.await.unwrap().unwrap();
    }
}
