//! Unified error type for the transport crate.
//!
//! Every fallible operation in this crate returns [`TransferError`]. The
//! variants split into two families the application treats differently:
//! setup-time errors (`ClientSetup`, `Config`) that should abort startup,
//! and runtime errors (`ClientTransfer`, `ClientConnection`, `RetriesPolicy`)
//! that are either retried by the connection kernel or reported per publish.

use thiserror::Error;

/// Errors produced by the MQTT transport.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Client construction failed before any network activity.
    ///
    /// Indicates malformed host/port or otherwise unusable options; callers
    /// should treat this as fatal and fix the configuration.
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// Connection configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] validator::ValidationErrors),

    /// The local client could not enqueue a packet.
    ///
    /// Usually means the request channel is closed because the kernel is
    /// shutting down. Not retried here.
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// The broker connection failed or was lost.
    ///
    /// Boxed because `rumqttc::ConnectionError` is large and would bloat the
    /// enum. Transient cases are retried by the kernel; fatal ones surface
    /// through the state channel.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// The MQTT protocol state machine was violated.
    #[error("Client connection state error: {0}")]
    ConnectionState(#[from] rumqttc::StateError),

    /// Reconnection gave up after exhausting the backoff schedule.
    #[error("Retry policy error: {0}")]
    RetriesPolicy(#[from] super::backoff::BackoffError),

    /// File or socket I/O failed outside the MQTT protocol itself.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}
