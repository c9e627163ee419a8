//! Retained state publishing.
//!
//! The `Publisher` is the write-side handle the application core holds. It
//! publishes the two-valued button state (`active`/`inactive`) as a retained
//! QoS-0 message, so late subscribers always see the last value and a failed
//! attempt is never re-sent — the next detection retries naturally.

use std::sync::Arc;

use rumqttc::{AsyncClient, QoS};
use tracing::debug;

use super::{
    error::TransferError,
    manager::{MqttInstance, PublishDrain},
};

/// Payload written for an active topic.
pub const STATE_ACTIVE: &str = "active";
/// Payload written for an inactive topic.
pub const STATE_INACTIVE: &str = "inactive";

/// Cloneable write handle over an [`MqttInstance`].
#[derive(Debug, Clone)]
pub struct Publisher {
    client: AsyncClient,
    base_topic: String,
    publish_drain: Arc<PublishDrain>,
}

impl Publisher {
    pub fn new(instance: &MqttInstance) -> Self {
        Self {
            client: instance.client().clone(),
            base_topic: instance.base_topic().to_string(),
            publish_drain: instance.publish_drain(),
        }
    }

    /// Configured topic prefix.
    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Prefixes `topic` with the base topic, normalizing slashes.
    pub fn with_base_topic(&self, topic: &str) -> String {
        if self.base_topic.is_empty() {
            topic.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_topic.trim_end_matches('/'),
                topic.trim_start_matches('/')
            )
        }
    }

    /// Publishes the retained state payload for `topic`.
    ///
    /// The call returns once the publish is enqueued with the client; broker
    /// acknowledgment is never awaited. At QoS 0 the attempt is made at most
    /// once, which is exactly the contract the debounce core expects.
    pub async fn publish_state(&self, topic: &str, active: bool) -> Result<(), TransferError> {
        let _guard = self.publish_drain.enter();

        let payload = if active { STATE_ACTIVE } else { STATE_INACTIVE };
        let full_topic = self.with_base_topic(topic);
        debug!("Notifying broker: {} -> {}", full_topic, payload);

        self.client
            .publish(full_topic, QoS::AtMostOnce, true, payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        super::{config::Config, manager::MqttManager},
        *,
    };

    async fn test_publisher(base_topic: &str) -> Publisher {
        let config = Config {
            base_topic: base_topic.into(),
            ..Default::default()
        };
        let instance = MqttManager::from_config(config)
            .unwrap()
            .build_and_start()
            .await
            .unwrap();
        Publisher::new(&instance)
    }

    #[tokio::test]
    async fn base_topic_prefixing() {
        let publisher = test_publisher("home").await;
        assert_eq!(publisher.with_base_topic("hall/button"), "home/hall/button");
        assert_eq!(publisher.with_base_topic("/hall/button"), "home/hall/button");
    }

    #[tokio::test]
    async fn empty_base_topic_is_passthrough() {
        let publisher = test_publisher("").await;
        assert_eq!(publisher.with_base_topic("hall/button"), "hall/button");
    }

    #[tokio::test]
    async fn publish_state_enqueues_without_broker() {
        // No broker is listening; enqueueing must still succeed because the
        // client buffers until the event loop delivers or drops.
        let publisher = test_publisher("home").await;
        publisher.publish_state("hall/button", true).await.unwrap();
        publisher.publish_state("hall/button", false).await.unwrap();
    }
}
