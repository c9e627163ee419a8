//! MQTT transport for pressbee.
//!
//! This crate owns the whole connection lifecycle so the application core
//! never has to: it builds the `rumqttc` client, drives the event loop,
//! reconnects with exponential backoff, broadcasts connection state over a
//! watch channel, and exposes a [`Publisher`] for retained state writes.
//!
//! Typical assembly:
//!
//! ```ignore
//! let manager = MqttManager::from_config(config)?;
//! let instance = manager.build_and_start().await?;
//! let publisher = Publisher::new(&instance);
//!
//! publisher.publish_state("hall/button", true).await?;
//! ```
//!
//! The instance hands out a `watch::Receiver<ConnectionState>` so callers can
//! gate startup on the first `Connected` transition and observe reconnects
//! without touching the transport internals.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod publisher;
pub mod state;

pub use config::Config;
pub use error::TransferError;
pub use manager::{MqttInstance, MqttManager};
pub use publisher::Publisher;
pub use state::ConnectionState;
