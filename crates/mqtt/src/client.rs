//! Construction of the `rumqttc` client from configuration.
//!
//! `ClientBuilder` maps a validated [`Config`] onto `MqttOptions` and hands
//! back the `(AsyncClient, EventLoop)` pair. The client is cloneable and
//! thread-safe; the event loop must be driven by exactly one task (the
//! connection kernel).

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions};

use super::{config::Config, error::TransferError};

/// Builder producing the client/event-loop pair for the kernel.
pub struct ClientBuilder {
    opts: MqttOptions,
    cap: usize,
}

impl ClientBuilder {
    /// Maps configuration onto `MqttOptions`.
    ///
    /// An empty `client_id` is replaced with a fresh UUID; brokers reject
    /// duplicate identifiers, and a stable-but-colliding default is worse
    /// than an unstable unique one.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        let client_id = if config.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.client_id.clone()
        };

        let mut opts = MqttOptions::new(client_id, config.host.clone(), config.port);
        opts.set_keep_alive(Duration::from_secs(config.keep_alive));
        opts.set_clean_session(config.clean_session);
        opts.set_inflight(config.max_inflight);

        if let Some(credentials) = &config.credentials {
            opts.set_credentials(credentials.username.clone(), credentials.password.clone());
        }

        let cap = config.request_channel_capacity.unwrap_or(10) as usize;

        Ok(Self { opts, cap })
    }

    /// Creates the client and its event loop.
    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        let (client, event_loop) = AsyncClient::new(self.opts, self.cap);
        Ok((client, event_loop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        let config = Config::default();
        let builder = ClientBuilder::from_config(&config).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn empty_client_id_gets_generated() {
        let config = Config {
            client_id: String::new(),
            ..Default::default()
        };
        let builder = ClientBuilder::from_config(&config).unwrap();
        // UUIDs are 36 characters; MqttOptions keeps whatever we set.
        assert_eq!(builder.opts.client_id().len(), 36);
    }

    #[test]
    fn explicit_client_id_is_kept() {
        let config = Config {
            client_id: "pressbee-main".into(),
            ..Default::default()
        };
        let builder = ClientBuilder::from_config(&config).unwrap();
        assert_eq!(builder.opts.client_id(), "pressbee-main");
    }
}
