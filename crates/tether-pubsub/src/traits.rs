use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PubSubResult;
use crate::message::Message;

/// Event-stream contract.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Start receiving messages published to `topic` from now on.
    async fn subscribe(&self, topic: &str) -> PubSubResult<Subscription>;

    async fn publish(&self, topic: &str, message: Message) -> PubSubResult<()>;

    /// Stop accepting publishes and subscriptions. Idempotent.
    async fn close(&self) -> PubSubResult<()>;
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, rx: mpsc::Receiver<Message>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}
