//! Broker connection configuration.
//!
//! Deserialized from the application's TOML config (the `[transport]`
//! section) and validated with the `validator` crate, so a malformed setup
//! fails at load time rather than at connect time.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// MQTT connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Topic prefix applied to every publish. Empty disables prefixing.
    #[validate(length(max = 255, message = "Base topic must not exceed 255 characters"))]
    pub base_topic: String,

    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port. 1883 plain, 8883 TLS-terminated by a proxy.
    #[validate(range(min = 1, message = "Port must not be 0"))]
    pub port: u16,

    /// Whether the broker should discard session state on connect.
    pub clean_session: bool,

    /// Concurrent unacknowledged QoS>0 publishes.
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max inflight must be between 1 and 1000"
    ))]
    pub max_inflight: u16,

    /// Keep-alive ping interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Client identifier. Empty means a UUID is generated per process.
    #[validate(length(max = 36, message = "Client ID must not exceed 36 characters"))]
    pub client_id: String,

    /// Capacity of the internal request channel; publishes beyond this
    /// backpressure the caller.
    #[validate(range(
        min = 1,
        max = 255,
        message = "Request channel capacity must be between 1 and 255"
    ))]
    pub request_channel_capacity: Option<u8>,

    /// Initial reconnect delay in seconds.
    #[validate(range(
        min = 1,
        max = 60,
        message = "Reconnect delay must be between 1 and 60 seconds"
    ))]
    pub reconnect_delay: u64,

    /// Attempt budget before the kernel gives up. 0 lets the backoff
    /// schedule derive its own cap from where the delay saturates.
    #[validate(range(max = 100, message = "Max reconnect attempts must not exceed 100"))]
    pub max_reconnect_attempts: u32,

    /// Growth factor of the reconnect delay, applied per attempt.
    #[validate(range(
        min = 1.0,
        max = 30.0,
        message = "Reconnect backoff multiplier must be between 1 and 30"
    ))]
    pub reconnect_backoff_multiplier: f64,

    /// Optional username/password authentication.
    pub credentials: Option<Credentials>,
}

/// Broker authentication pair.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, message = "Username must not be empty"))]
    pub username: String,

    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_topic: String::new(),
            host: "localhost".to_string(),
            port: 1883,
            clean_session: true,
            max_inflight: 20,
            keep_alive: 60,
            client_id: String::new(),
            request_channel_capacity: Some(10),
            reconnect_delay: 1,
            max_reconnect_attempts: 0,
            reconnect_backoff_multiplier: 1.1,
            credentials: None,
        }
    }
}
