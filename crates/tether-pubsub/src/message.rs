use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Metadata key recording the topic a message was originally published to,
/// set on messages routed to the undeliverable topic.
pub const ORIGINAL_TOPIC_KEY: &str = "original_topic";

/// How a delivery was settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ack,
    Nack,
}

/// An opaque payload travelling over a topic.
///
/// Each delivery of a message can be settled once; the first of
/// [`ack`](Self::ack) or [`nack`](Self::nack) wins and later calls return
/// `false`.
pub struct Message {
    pub id: Uuid,
    pub payload: Bytes,
    pub metadata: HashMap<String, String>,
    settled: AtomicBool,
    settle_tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::now_v7(),
            payload: payload.into(),
            metadata: HashMap::new(),
            settled: AtomicBool::new(false),
            settle_tx: Mutex::new(None),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark this delivery as processed.
    pub fn ack(&self) -> bool {
        self.settle(Outcome::Ack)
    }

    /// Reject this delivery, asking for redelivery.
    pub fn nack(&self) -> bool {
        self.settle(Outcome::Nack)
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    fn settle(&self, outcome: Outcome) -> bool {
        if self.settled.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(tx) = self.settle_tx.lock().expect("message lock poisoned").take() {
            let _ = tx.send(outcome);
        }
        true
    }

    /// A fresh, unsettled delivery of this message reporting to `tx`.
    pub(crate) fn delivery(&self, tx: oneshot::Sender<Outcome>) -> Self {
        Self {
            id: self.id,
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
            settled: AtomicBool::new(false),
            settle_tx: Mutex::new(Some(tx)),
        }
    }

    /// An unsettled copy with no delivery attached.
    pub(crate) fn detached(&self) -> Self {
        let mut copy = Self::new(self.payload.clone());
        copy.id = self.id;
        copy.metadata = self.metadata.clone();
        copy
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("len", &self.payload.len())
            .field("metadata", &self.metadata)
            .field("settled", &self.is_settled())
            .finish()
    }
}
