//! Readiness tracking for the broker connection.
//!
//! Translates transport connection state into an application-level readiness
//! signal. The orchestrator blocks on the *first* `Ready` before registering
//! buttons, and only the first one: later reconnects surface here as state
//! changes but never re-run setup, and never touch pending revert timers.
//!
//! `Failed` is terminal — the transport gave up (fatal broker error or
//! exhausted retries). During startup that ends the process.

use std::fmt;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use pressbee_mqtt::ConnectionState;

/// Application-level readiness of the notification path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    /// The broker accepted the connection; publishes will go through.
    Ready,
    /// Not connected yet (or reconnecting), with a reason.
    NotReadyYet(String),
    /// The transport stopped trying. Carries the terminal reason.
    Failed(String),
    /// No information yet.
    Unknown,
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ReadinessState::Failed(_))
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::Ready => write!(f, "Ready"),
            ReadinessState::NotReadyYet(reason) => write!(f, "NotReadyYet: {}", reason),
            ReadinessState::Failed(reason) => write!(f, "Failed: {}", reason),
            ReadinessState::Unknown => write!(f, "Unknown"),
        }
    }
}

fn adapt_connection_state(state: &ConnectionState) -> ReadinessState {
    match state {
        ConnectionState::Connected => ReadinessState::Ready,
        ConnectionState::Connecting => ReadinessState::NotReadyYet("Connecting...".to_string()),
        ConnectionState::Reconnecting(secs) => {
            ReadinessState::NotReadyYet(format!("Reconnecting in {:.1} sec", secs))
        }
        // The kernel only broadcasts Disconnected when it has given up.
        ConnectionState::Disconnected(reason) => ReadinessState::Failed(reason.clone()),
    }
}

/// Shared readiness tracker fanning state out to any number of observers.
#[derive(Debug, Clone)]
pub struct Readiness {
    state_tx: watch::Sender<ReadinessState>,
    state_rx: watch::Receiver<ReadinessState>,
}

impl Readiness {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(ReadinessState::Unknown);
        Self { state_tx, state_rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> ReadinessState {
        self.state_rx.borrow().clone()
    }

    /// Spawns a task mirroring transport connection state into readiness.
    pub async fn start_listening(&self, connection_state_rx: watch::Receiver<ConnectionState>) {
        let state_tx = self.state_tx.clone();
        tokio::spawn(async move {
            listen(connection_state_rx, state_tx).await;
        });
    }

    /// Directly updates the state (used by tests and manual wiring).
    pub fn set_state(&self, state: ReadinessState) {
        let old_state = self.state_rx.borrow().clone();
        let _ = self.state_tx.send(state.clone());
        debug!("Readiness changed: {} -> {}", old_state, state);
    }

    /// Blocks until the first `Ready` or a terminal `Failed`.
    ///
    /// Returns `Ok(())` on ready and the failure reason otherwise. Honors
    /// exactly one ready transition; callers run their setup once and ignore
    /// this channel afterwards.
    pub async fn wait_ready(&self) -> Result<(), String> {
        let mut rx = self.subscribe();
        loop {
            let state = rx.borrow().clone();
            match state {
                ReadinessState::Ready => return Ok(()),
                ReadinessState::Failed(reason) => return Err(reason),
                other => {
                    tokio::select! {
                        changed = rx.changed() => {
                            if changed.is_err() {
                                return Err("readiness channel closed".to_string());
                            }
                        }
                        _ = tokio::time::sleep(std::time::Duration::from_secs(30)) => {
                            warn!("Still waiting for broker readiness... Current: {}", other);
                        }
                    }
                }
            }
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

async fn listen(
    mut connection_state_rx: watch::Receiver<ConnectionState>,
    state_tx: watch::Sender<ReadinessState>,
) {
    debug!("Mirroring transport connection state into readiness");

    {
        let conn_state = connection_state_rx.borrow().clone();
        let readiness = adapt_connection_state(&conn_state);
        info!("Initial broker state: {}", conn_state);
        let _ = state_tx.send(readiness);
    }

    while connection_state_rx.changed().await.is_ok() {
        let conn_state = connection_state_rx.borrow().clone();
        let readiness = adapt_connection_state(&conn_state);
        debug!("Transport {} -> readiness {}", conn_state, readiness);

        if state_tx.send(readiness).is_err() {
            warn!("No subscribers to readiness state");
            break;
        }
    }

    debug!("Connection state channel closed, readiness mirroring stopped");
}
