use std::sync::Arc;

use tracing::debug;

use tether_pubsub::{Message, PubSub, ANCHOR_TOPIC, DID_TOPIC};
use tether_types::{AnchorInfo, DidEvent};

use crate::error::ObserverResult;

/// Publishes events onto the streams the [`Observer`](crate::Observer) consumes.
#[derive(Clone)]
pub struct Publisher {
    pubsub: Arc<dyn PubSub>,
}

impl Publisher {
    pub fn new(pubsub: Arc<dyn PubSub>) -> Self {
        Self { pubsub }
    }

    /// Announce a newly published anchor.
    pub async fn publish_anchor(&self, info: &AnchorInfo) -> ObserverResult<()> {
        let payload = info.to_json()?;
        self.pubsub.publish(ANCHOR_TOPIC, Message::new(payload)).await?;
        debug!(address = %info.content_address.short(), "published anchor");
        Ok(())
    }

    /// Announce that `event.suffix` was affected by `event.address`.
    pub async fn publish_did(&self, event: &DidEvent) -> ObserverResult<()> {
        self.pubsub
            .publish(DID_TOPIC, Message::new(event.to_string()))
            .await?;
        debug!(address = %event.address.short(), suffix = %event.suffix, "published DID event");
        Ok(())
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tether_pubsub::{MemPubSub, PubSubError};
    use tether_types::ContentAddress;

    #[tokio::test]
    async fn anchor_and_did_events_land_on_their_topics() {
        let pubsub = MemPubSub::default();
        let mut anchors = pubsub.subscribe(ANCHOR_TOPIC).await.unwrap();
        let mut dids = pubsub.subscribe(DID_TOPIC).await.unwrap();
        let publisher = Publisher::new(Arc::new(pubsub));

        let address = ContentAddress::of(b"anchor");
        let info = AnchorInfo::new(address.clone()).with_hint("ipfs");
        publisher.publish_anchor(&info).await.unwrap();
        publisher
            .publish_did(&DidEvent::new(address.clone(), "d1"))
            .await
            .unwrap();

        let wait = Duration::from_secs(2);
        let msg = tokio::time::timeout(wait, anchors.recv()).await.unwrap().unwrap();
        assert_eq!(AnchorInfo::from_json(&msg.payload).unwrap(), info);
        msg.ack();

        let msg = tokio::time::timeout(wait, dids.recv()).await.unwrap().unwrap();
        assert_eq!(&msg.payload[..], format!("{address}:d1").as_bytes());
        msg.ack();
    }

    #[tokio::test]
    async fn publishing_on_closed_stream_fails() {
        let pubsub = MemPubSub::default();
        pubsub.close().await.unwrap();
        let publisher = Publisher::new(Arc::new(pubsub));
        let err = publisher
            .publish_did(&DidEvent::new(ContentAddress::of(b"a"), "d1"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::ObserverError::PubSub(PubSubError::Closed)));
    }
}
