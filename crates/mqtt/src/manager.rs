//! Assembly of the transport: manager, instance, publish drain.
//!
//! `MqttManager` wires the client, the connection kernel, and the shutdown
//! path together and returns an [`MqttInstance`] — the handle application
//! code keeps. Shutdown is two-staged: cancelling the instance token stops
//! accepting work, the drain barrier waits for in-flight publishes, and only
//! then is the connection kernel stopped so nothing queued is lost.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rumqttc::AsyncClient;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{
    client::ClientBuilder, config::Config, connection::ConnectionKernel, error::TransferError,
    state::ConnectionState,
};

/// Barrier tracking in-flight publishes.
///
/// Publishers hold a [`PublishGuard`] for the duration of each publish; the
/// shutdown bridge waits for the count to reach zero before cancelling the
/// connection kernel.
#[derive(Debug)]
pub struct PublishDrain {
    inflight: AtomicUsize,
    notify: Notify,
}

impl PublishDrain {
    pub fn new() -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    pub fn enter(self: &Arc<Self>) -> PublishGuard {
        self.inflight.fetch_add(1, Ordering::AcqRel);
        PublishGuard {
            drain: self.clone(),
        }
    }

    pub async fn wait_idle(&self) {
        while self.inflight.load(Ordering::Acquire) != 0 {
            self.notify.notified().await;
        }
    }
}

impl Default for PublishDrain {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PublishGuard {
    drain: Arc<PublishDrain>,
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        if self.drain.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drain.notify.notify_waiters();
        }
    }
}

/// Entry point for building the transport.
pub struct MqttManager {
    config: Config,
    cancel_token: CancellationToken,
}

impl MqttManager {
    /// Creates a manager from a loaded configuration.
    pub fn from_config(config: Config) -> Result<Self, TransferError> {
        Ok(Self {
            config,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Builds the client and connection kernel, spawns the kernel task, and
    /// returns the instance handle.
    ///
    /// The connection itself is established asynchronously after this
    /// returns; observe `state_receiver()` for the first `Connected`.
    pub async fn build_and_start(self) -> Result<MqttInstance, TransferError> {
        let (client, event_loop) = ClientBuilder::from_config(&self.config)?.build()?;

        // Separate token so the kernel outlives the instance token until the
        // publish drain is empty.
        let connection_cancel = CancellationToken::new();
        let mut kernel = ConnectionKernel::new(
            client.clone(),
            event_loop,
            &self.config,
            connection_cancel.clone(),
        );
        let state_rx = kernel.subscribe_state();
        let publish_drain = Arc::new(PublishDrain::new());

        info!(
            "MQTT transport assembled for {}:{} (base_topic: '{}')",
            self.config.host, self.config.port, self.config.base_topic
        );

        tokio::spawn(async move {
            if let Err(e) = kernel.run().await {
                // Terminal state is already on the watch channel; observers
                // decide whether this is fatal for them.
                error!("MQTT connection kernel exited: {}", e);
            }
        });

        {
            let shutdown_request = self.cancel_token.clone();
            let drain = publish_drain.clone();
            let conn_cancel = connection_cancel.clone();
            tokio::spawn(async move {
                shutdown_request.cancelled().await;
                drain.wait_idle().await;
                conn_cancel.cancel();
            });
        }

        Ok(MqttInstance {
            client,
            state_rx,
            cancel_token: self.cancel_token,
            connection_cancel,
            base_topic: self.config.base_topic,
            publish_drain,
        })
    }

    /// Token that triggers the drain-then-disconnect shutdown sequence.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Live transport handle: client, state channel, shutdown token.
#[derive(Debug, Clone)]
pub struct MqttInstance {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    cancel_token: CancellationToken,
    connection_cancel: CancellationToken,
    base_topic: String,
    publish_drain: Arc<PublishDrain>,
}

impl MqttInstance {
    /// The underlying client; cloneable and thread-safe.
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    /// Receiver of connection state transitions.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Configured topic prefix.
    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Token that, when cancelled, runs the graceful shutdown sequence.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Drain barrier shared with publishers.
    pub fn publish_drain(&self) -> Arc<PublishDrain> {
        self.publish_drain.clone()
    }

    /// Gracefully disconnects: stop accepting work, wait out in-flight
    /// publishes, then stop the kernel.
    pub async fn shutdown(&self) -> Result<(), TransferError> {
        self.cancel_token.cancel();
        self.publish_drain.wait_idle().await;
        self.connection_cancel.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_keeps_config() {
        let config = Config {
            base_topic: "home".into(),
            ..Default::default()
        };
        let manager = MqttManager::from_config(config).unwrap();
        assert_eq!(manager.config().base_topic, "home");
        assert!(!manager.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn build_and_start_yields_instance() {
        let manager = MqttManager::from_config(Config::default()).unwrap();
        let instance = manager.build_and_start().await.unwrap();

        assert_eq!(instance.base_topic(), "");
        assert_eq!(
            *instance.state_receiver().borrow(),
            ConnectionState::Connecting
        );

        instance.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn drain_waits_for_guards() {
        let drain = Arc::new(PublishDrain::new());

        let guard = drain.enter();
        let waiter = {
            let drain = drain.clone();
            tokio::spawn(async move { drain.wait_idle().await })
        };

        // The waiter cannot finish while a guard is held.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
