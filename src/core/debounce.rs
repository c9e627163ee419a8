//! Press debouncing and notification state machine.
//!
//! Buttons of this class retransmit their wake broadcast several times per
//! physical press. Forwarding every signal straight to the broker would flap
//! the topic between active and inactive; instead each topic owns a single
//! revert slot. A detection immediately notifies `active` and (re)arms a
//! fixed-delay revert that notifies `inactive` — so a burst collapses into
//! one pulse whose trailing edge is measured from the *last* signal.
//!
//! Per topic the machine is:
//!
//! ```text
//! Idle --detected--> Active      (notify active, arm revert)
//! Active --detected--> Active    (notify active again, re-arm, supersede)
//! Active --revert elapsed--> Idle (notify inactive)
//! ```
//!
//! Nothing is published at startup; a restart simply begins at Idle.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Sink for topic state notifications.
///
/// Implementations must return once the notification is handed off; the
/// controller never waits on broker acknowledgment, and a slow or failed
/// write must not delay re-arming for the next press.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        topic: &str,
        active: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A scheduled revert to inactive, superseded by any newer detection.
struct PendingRevert {
    generation: u64,
}

/// Turns raw detection signals into debounced active/inactive pulses.
///
/// The pending-revert map is the only mutable state; it is guarded by a
/// plain mutex that is never held across an await, which makes the
/// cancel-then-replace step atomic with respect to a racing expiry. A
/// superseded revert task wakes, finds its generation stale, and exits
/// without publishing — it can never fire after cancellation.
pub struct DebounceController {
    notifier: Arc<dyn Notifier>,
    revert_delay: Duration,
    pending: Arc<Mutex<HashMap<String, PendingRevert>>>,
    generations: AtomicU64,
}

impl DebounceController {
    pub fn new(notifier: Arc<dyn Notifier>, revert_delay: Duration) -> Self {
        Self {
            notifier,
            revert_delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// The fixed delay between the last detection and the inactive edge.
    pub fn revert_delay(&self) -> Duration {
        self.revert_delay
    }

    /// True while a revert is pending for `topic` (the Active state).
    pub fn is_active(&self, topic: &str) -> bool {
        lock_pending(&self.pending).contains_key(topic)
    }

    /// Handles one detection signal for `topic`.
    ///
    /// Cancels any pending revert, notifies `active` (unconditionally, even
    /// when the topic is already active — the sink is retained, repeats are
    /// harmless), then arms a fresh revert. Notification errors are logged
    /// and dropped; they never disturb the timer state or other topics, and
    /// the next detection retries naturally.
    pub async fn on_detected(&self, topic: &str) {
        {
            let mut pending = lock_pending(&self.pending);
            if pending.remove(topic).is_some() {
                debug!("Superseding pending revert for '{}'", topic);
            }
        }

        if let Err(e) = self.notifier.notify(topic, true).await {
            warn!("Failed to notify '{}' active: {}", topic, e);
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        lock_pending(&self.pending).insert(topic.to_string(), PendingRevert { generation });

        let pending = Arc::clone(&self.pending);
        let notifier = Arc::clone(&self.notifier);
        let delay = self.revert_delay;
        let topic = topic.to_string();
        tokio::spawn(async move {
            sleep(delay).await;

            if !take_if_current(&pending, &topic, generation) {
                return;
            }

            info!("Reverting '{}' to inactive", topic);
            if let Err(e) = notifier.notify(&topic, false).await {
                warn!("Failed to notify '{}' inactive: {}", topic, e);
            }
        });
    }
}

/// Consumes the revert slot for `topic` if it still belongs to `generation`.
/// The single lock acquisition is what makes a superseded timer unable to
/// fire.
fn take_if_current(
    pending: &Mutex<HashMap<String, PendingRevert>>,
    topic: &str,
    generation: u64,
) -> bool {
    let mut pending = lock_pending(pending);
    match pending.get(topic) {
        Some(revert) if revert.generation == generation => {
            pending.remove(topic);
            true
        }
        _ => false,
    }
}

// A poisoned lock only means a panic elsewhere; the map itself is always
// consistent between statements.
fn lock_pending(
    pending: &Mutex<HashMap<String, PendingRevert>>,
) -> MutexGuard<'_, HashMap<String, PendingRevert>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// MQTT-backed notifier: retained state publish per topic.
#[async_trait::async_trait]
impl Notifier for pressbee_mqtt::Publisher {
    async fn notify(
        &self,
        topic: &str,
        active: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.publish_state(topic, active)
            .await
            .map_err(|e| Box::new(e) as _)
    }
}
