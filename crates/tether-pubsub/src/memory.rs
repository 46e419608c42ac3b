use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{PubSubError, PubSubResult};
use crate::message::{Message, Outcome, ORIGINAL_TOPIC_KEY};
use crate::traits::{PubSub, Subscription};
use crate::UNDELIVERABLE_TOPIC;

/// Delivery settings for [`MemPubSub`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    /// How long a delivery may stay unsettled before it is redelivered, in ms.
    pub timeout_ms: u64,
    /// Redeliveries after the first attempt before giving up.
    pub max_redeliveries: u32,
    /// Pause before each redelivery, in ms.
    pub redelivery_delay_ms: u64,
    /// Per-subscriber channel capacity.
    pub buffer_size: usize,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_redeliveries: 5,
            redelivery_delay_ms: 1_000,
            buffer_size: 128,
        }
    }
}

impl PubSubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn redelivery_delay(&self) -> Duration {
        Duration::from_millis(self.redelivery_delay_ms)
    }
}

struct Inner {
    config: PubSubConfig,
    topics: RwLock<HashMap<String, Vec<mpsc::Sender<Message>>>>,
    closed: AtomicBool,
}

/// In-process [`PubSub`] with at-least-once delivery.
///
/// Every subscriber of a topic gets its own copy of each message. Each copy
/// is watched by a delivery task that redelivers it after a nack, a drop
/// without settlement, or the delivery timeout.
#[derive(Clone)]
pub struct MemPubSub {
    inner: Arc<Inner>,
}

impl MemPubSub {
    pub fn new(config: PubSubConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                topics: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Live subscribers of `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .expect("topic lock poisoned")
            .get(topic)
            .map(|subs| subs.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for MemPubSub {
    fn default() -> Self {
        Self::new(PubSubConfig::default())
    }
}

impl Inner {
    fn senders(&self, topic: &str) -> Vec<mpsc::Sender<Message>> {
        let mut topics = self.topics.write().expect("topic lock poisoned");
        match topics.get_mut(topic) {
            Some(subs) => {
                subs.retain(|s| !s.is_closed());
                subs.clone()
            }
            None => Vec::new(),
        }
    }

    fn dispatch(self: &Arc<Self>, topic: &str, message: &Message) {
        let senders = self.senders(topic);
        if senders.is_empty() {
            debug!(topic, id = %message.id, "no subscribers; dropping message");
            return;
        }
        for sender in senders {
            let inner = Arc::clone(self);
            let topic = topic.to_string();
            let message = message.detached();
            tokio::spawn(async move { inner.deliver(topic, sender, message).await });
        }
    }

    async fn deliver(self: Arc<Self>, topic: String, sender: mpsc::Sender<Message>, message: Message) {
        // Messages that already failed elsewhere get one attempt only.
        let budget = if topic == UNDELIVERABLE_TOPIC {
            0
        } else {
            self.config.max_redeliveries
        };

        let mut attempt = 0u32;
        loop {
            let (tx, rx) = oneshot::channel();
            if sender.send(message.delivery(tx)).await.is_err() {
                debug!(topic, id = %message.id, "subscriber gone; abandoning delivery");
                return;
            }

            let outcome = match tokio::time::timeout(self.config.timeout(), rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Outcome::Nack,
                Err(_) => {
                    debug!(topic, id = %message.id, attempt, "delivery timed out");
                    Outcome::Nack
                }
            };
            if outcome == Outcome::Ack {
                return;
            }

            if attempt >= budget {
                break;
            }
            attempt += 1;
            tokio::time::sleep(self.config.redelivery_delay()).await;
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            debug!(topic, id = %message.id, attempt, "redelivering message");
        }

        if topic == UNDELIVERABLE_TOPIC {
            warn!(id = %message.id, "undeliverable message was not acknowledged; dropping");
            return;
        }
        warn!(topic, id = %message.id, attempts = attempt + 1, "redelivery budget exhausted; routing to undeliverable");
        let dead = message
            .detached()
            .with_metadata(ORIGINAL_TOPIC_KEY, topic.as_str());
        self.dispatch(UNDELIVERABLE_TOPIC, &dead);
    }
}

#[async_trait]
impl PubSub for MemPubSub {
    async fn subscribe(&self, topic: &str) -> PubSubResult<Subscription> {
        if self.is_closed() {
            return Err(PubSubError::Closed);
        }
        let (tx, rx) = mpsc::channel(self.inner.config.buffer_size.max(1));
        self.inner
            .topics
            .write()
            .expect("topic lock poisoned")
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        debug!(topic, "subscribed");
        Ok(Subscription::new(topic, rx))
    }

    async fn publish(&self, topic: &str, message: Message) -> PubSubResult<()> {
        if self.is_closed() {
            return Err(PubSubError::Closed);
        }
        self.inner.dispatch(topic, &message);
        Ok(())
    }

    async fn close(&self) -> PubSubResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.topics.write().expect("topic lock poisoned").clear();
        debug!("pub/sub closed");
        Ok(())
    }
}

impl std::fmt::Debug for MemPubSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemPubSub")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}
