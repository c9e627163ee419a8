//! Probe listener configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings for the UDP probe listener that observes button wake broadcasts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ListenerConfig {
    /// Socket address to bind. Buttons announce themselves with a DHCP
    /// DISCOVER broadcast, so the default is the bootps port; binding it
    /// requires the process to run privileged or with CAP_NET_BIND_SERVICE.
    #[validate(length(min = 1, message = "Listener bind address must not be empty"))]
    pub bind: String,

    /// Per-device signal channel depth. A burst of retransmissions beyond
    /// this is dropped, which the debounce window absorbs anyway.
    #[validate(range(min = 1, max = 1024, message = "Channel depth must be between 1 and 1024"))]
    pub channel_depth: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:67".to_string(),
            channel_depth: 16,
        }
    }
}
