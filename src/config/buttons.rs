//! Button mapping configuration.
//!
//! The `[buttons]` section carries the device-to-topic mapping this whole
//! process exists to serve: one entry per physical button, keyed by its
//! hardware address. Addresses must be unique; several buttons may share a
//! topic.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A single configured button: hardware address and destination topic.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Button {
    /// Hardware (MAC) address of the device, e.g. `ac:63:be:2a:11:b0`.
    /// Accepted with `:` or `-` separators, any case.
    #[validate(custom(function = "validate_address"))]
    pub address: String,

    /// Broker topic the button's state is published to.
    #[validate(length(min = 1, message = "Button topic must not be empty"))]
    pub topic: String,
}

/// Canonical form of a hardware address: lowercase, colon-separated.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase().replace('-', ":")
}

fn validate_address(address: &str) -> Result<(), ValidationError> {
    let normalized = normalize_address(address);
    let octets: Vec<&str> = normalized.split(':').collect();

    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

    if well_formed {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_hardware_address");
        err.message = Some(format!("Invalid hardware address: {}", address).into());
        Err(err)
    }
}

/// The set of configured buttons and the revert timing.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_unique_addresses"))]
pub struct ButtonsConfig {
    /// Seconds a topic stays active after the last detection.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Revert delay must be between 1 and 3600 seconds"
    ))]
    pub revert_delay: u64,

    /// Configured buttons. At least one is required.
    #[validate(
        length(min = 1, message = "At least one button must be configured"),
        nested
    )]
    pub mapping: Vec<Button>,
}

fn validate_unique_addresses(config: &ButtonsConfig) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for button in &config.mapping {
        if !seen.insert(normalize_address(&button.address)) {
            let mut err = ValidationError::new("duplicate_hardware_address");
            err.message = Some(format!("Duplicate hardware address: {}", button.address).into());
            return Err(err);
        }
    }
    Ok(())
}

impl Default for ButtonsConfig {
    fn default() -> Self {
        Self {
            revert_delay: 10,
            mapping: vec![Button {
                address: "aa:bb:cc:dd:ee:ff".into(),
                topic: "home/button/example".into(),
            }],
        }
    }
}

impl ButtonsConfig {
    /// Looks up the topic for a (possibly unnormalized) address.
    pub fn topic_for(&self, address: &str) -> Option<&str> {
        let wanted = normalize_address(address);
        self.mapping
            .iter()
            .find(|b| normalize_address(&b.address) == wanted)
            .map(|b| b.topic.as_str())
    }

    /// Normalized addresses of all configured buttons.
    pub fn addresses(&self) -> Vec<String> {
        self.mapping
            .iter()
            .map(|b| normalize_address(&b.address))
            .collect()
    }
}
