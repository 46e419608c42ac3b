use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tether_graph::{AnchorGraph, AnchorNode};
use tether_index::DidAnchorIndex;
use tether_pubsub::{Message, PubSub, Subscription, ANCHOR_TOPIC, DID_TOPIC};
use tether_types::{
    AnchorInfo, AnchorPayload, Classify, ContentAddress, DidEvent, DiscoveryHint, MetricsSink,
};

use crate::config::ObserverConfig;
use crate::error::{ObserverError, ObserverResult};
use crate::plan::{merge_histories, PlannedAnchor};
use crate::protocol::{AnchorTxn, ProtocolClientProvider, TransactionProcessor};
use crate::publisher::Publisher;

/// Collaborators injected into an [`Observer`].
#[derive(Clone)]
pub struct Providers {
    pub pubsub: Arc<dyn PubSub>,
    pub graph: Arc<AnchorGraph>,
    pub index: Arc<dyn DidAnchorIndex>,
    pub protocols: Arc<dyn ProtocolClientProvider>,
    pub metrics: Arc<dyn MetricsSink>,
}

#[derive(Clone, Copy, Debug)]
enum Stream {
    Anchor,
    Did,
}

struct Inner {
    graph: Arc<AnchorGraph>,
    index: Arc<dyn DidAnchorIndex>,
    protocols: Arc<dyn ProtocolClientProvider>,
    metrics: Arc<dyn MetricsSink>,
    default_hint: Option<DiscoveryHint>,
    /// Serializes index writes between the two workers.
    index_writes: AsyncMutex<()>,
}

/// Index entry per suffix as a plan last saw it.
type SeenEntries = HashMap<String, Option<ContentAddress>>;

/// Consumes the anchor and DID streams and applies anchors in history order.
///
/// Each stream is handled by its own worker; messages from one stream are
/// processed one at a time, the two streams run in parallel.
pub struct Observer {
    inner: Arc<Inner>,
    publisher: Publisher,
    subscriptions: Mutex<Option<(Subscription, Subscription)>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    stopped: AtomicBool,
}

impl Observer {
    /// Subscribe to both streams. Fails if either subscription cannot be
    /// established or the default discovery hint does not parse.
    pub async fn new(config: ObserverConfig, providers: Providers) -> ObserverResult<Self> {
        let default_hint = match &config.discovery_hint {
            Some(hint) => Some(DiscoveryHint::parse(hint).map_err(|source| {
                ObserverError::InvalidHint {
                    hint: hint.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let anchors = subscribe(providers.pubsub.as_ref(), ANCHOR_TOPIC).await?;
        let dids = subscribe(providers.pubsub.as_ref(), DID_TOPIC).await?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(Inner {
                graph: providers.graph,
                index: providers.index,
                protocols: providers.protocols,
                metrics: providers.metrics,
                default_hint,
                index_writes: AsyncMutex::new(()),
            }),
            publisher: Publisher::new(providers.pubsub),
            subscriptions: Mutex::new(Some((anchors, dids))),
            workers: Mutex::new(Vec::new()),
            shutdown,
            stopped: AtomicBool::new(false),
        })
    }

    /// Spawn the two stream workers. Calling it again is a no-op.
    pub fn start(&self) {
        let taken = self
            .subscriptions
            .lock()
            .expect("subscription lock poisoned")
            .take();
        let Some((anchors, dids)) = taken else {
            return;
        };

        let mut workers = self.workers.lock().expect("worker lock poisoned");
        for (stream, sub) in [(Stream::Anchor, anchors), (Stream::Did, dids)] {
            let inner = Arc::clone(&self.inner);
            let shutdown = self.shutdown.subscribe();
            workers.push(tokio::spawn(run_worker(inner, stream, sub, shutdown)));
        }
        info!("observer started");
    }

    /// Stop both workers and release the subscriptions.
    ///
    /// A message already being handled is finished and settled first.
    /// Calling it again is a no-op.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        drop(
            self.subscriptions
                .lock()
                .expect("subscription lock poisoned")
                .take(),
        );

        let workers = std::mem::take(&mut *self.workers.lock().expect("worker lock poisoned"));
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "observer worker ended abnormally");
            }
        }
        info!("observer stopped");
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("default_hint", &self.inner.default_hint)
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

async fn subscribe(pubsub: &dyn PubSub, topic: &str) -> ObserverResult<Subscription> {
    pubsub
        .subscribe(topic)
        .await
        .map_err(|source| ObserverError::Subscribe {
            topic: topic.to_string(),
            source,
        })
}

async fn run_worker(
    inner: Arc<Inner>,
    stream: Stream,
    mut sub: Subscription,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(topic = sub.topic(), "observer worker running");
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            message = sub.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        match stream {
            Stream::Anchor => inner.on_anchor(&message).await,
            Stream::Did => inner.on_did(&message).await,
        }
    }
    debug!(topic = sub.topic(), "observer worker exiting");
}

/// Ack or nack `message` according to how handling went, logging failures.
fn settle(message: &Message, topic: &str, event: &str, result: ObserverResult<usize>) {
    match result {
        Ok(applied) => {
            debug!(topic, event, applied, "event processed");
            message.ack();
        }
        Err(e) if e.class().is_retryable() => {
            warn!(topic, event, error = %e, "transient failure; nacking for redelivery");
            message.nack();
        }
        Err(e) => {
            error!(
                topic,
                event,
                class = e.class().as_str(),
                error = %e,
                "permanent failure; acknowledging and dropping"
            );
            message.ack();
        }
    }
}

impl Inner {
    async fn on_anchor(&self, message: &Message) {
        let started = Instant::now();
        match AnchorInfo::from_json(&message.payload) {
            Ok(info) => {
                let result = self.process_anchor(&info).await;
                settle(message, ANCHOR_TOPIC, info.content_address.as_str(), result);
            }
            Err(e) => {
                let raw = String::from_utf8_lossy(&message.payload);
                settle(message, ANCHOR_TOPIC, &raw, Err(e.into()));
            }
        }
        self.metrics.process_anchor_time(started.elapsed());
    }

    async fn on_did(&self, message: &Message) {
        let started = Instant::now();
        let raw = String::from_utf8_lossy(&message.payload);
        let result = match DidEvent::parse(&raw) {
            Ok(event) => self.process_did(&event).await,
            Err(e) => Err(e.into()),
        };
        settle(message, DID_TOPIC, &raw, result);
        self.metrics.process_did_time(started.elapsed());
    }

    async fn process_anchor(&self, info: &AnchorInfo) -> ObserverResult<usize> {
        let hint = match info.discovery_hint()? {
            Some(hint) => Some(hint),
            None => self.default_hint.clone(),
        };
        let hint = hint.as_ref();
        let address = &info.content_address;

        let credential = self.graph.read(address, hint).await?;
        let suffixes: Vec<String> = credential
            .payload()
            .suffixes()
            .map(str::to_string)
            .collect();
        let applied = self.index.get_bulk(&suffixes)?;

        let mut chains = Vec::with_capacity(suffixes.len());
        let mut seen = SeenEntries::with_capacity(suffixes.len());
        for (suffix, applied) in suffixes.into_iter().zip(applied) {
            let chain = self
                .unapplied_chain(address, &suffix, applied.as_ref(), hint)
                .await?;
            if !chain.is_empty() {
                seen.insert(suffix.clone(), applied);
                chains.push((suffix, chain));
            }
        }
        if chains.is_empty() {
            debug!(address = %address.short(), "anchor already applied for every suffix");
            return Ok(0);
        }

        self.apply(merge_histories(chains)?, seen, hint).await
    }

    async fn process_did(&self, event: &DidEvent) -> ObserverResult<usize> {
        let hint = self.default_hint.as_ref();
        let applied = self.index.get(&event.suffix)?;
        let chain = self
            .unapplied_chain(&event.address, &event.suffix, applied.as_ref(), hint)
            .await?;
        if chain.is_empty() {
            debug!(address = %event.address.short(), suffix = %event.suffix, "already applied");
            return Ok(0);
        }
        let seen = SeenEntries::from([(event.suffix.clone(), applied)]);
        self.apply(merge_histories(vec![(event.suffix.clone(), chain)])?, seen, hint)
            .await
    }

    /// Anchors for `suffix` ending at `address` that are not yet applied,
    /// oldest first.
    async fn unapplied_chain(
        &self,
        address: &ContentAddress,
        suffix: &str,
        applied: Option<&ContentAddress>,
        hint: Option<&DiscoveryHint>,
    ) -> ObserverResult<Vec<AnchorNode>> {
        let Some(applied) = applied else {
            return Ok(self.graph.get_did_anchors(address, suffix, hint).await?);
        };
        if applied == address {
            return Ok(Vec::new());
        }

        let history = self
            .graph
            .get_did_anchors_until(address, suffix, Some(applied), hint)
            .await?;
        if history.reached_stop {
            return Ok(history.anchors);
        }
        // The walk passed the suffix's first anchor without meeting the
        // applied one: either we are behind it, or the history forked.
        if self.graph.is_ancestor(address, applied, suffix, hint).await? {
            debug!(
                address = %address.short(),
                suffix,
                applied = %applied.short(),
                "anchor precedes applied anchor"
            );
            return Ok(Vec::new());
        }
        Err(ObserverError::AmbiguousHistory {
            suffix: suffix.to_string(),
            anchor: address.clone(),
            applied: applied.clone(),
        })
    }

    /// Apply each planned anchor, recording it in the index once its
    /// processor succeeds. Returns the number of anchors applied.
    async fn apply(
        &self,
        plan: Vec<PlannedAnchor>,
        mut seen: SeenEntries,
        hint: Option<&DiscoveryHint>,
    ) -> ObserverResult<usize> {
        let mut applied = 0;
        for planned in plan {
            let txn = AnchorTxn::from(&planned.node);
            let processor = self.processor_for(&txn.payload)?;
            let operations = processor
                .process(&txn, &planned.suffixes)
                .await
                .map_err(|source| ObserverError::Process {
                    address: txn.address.clone(),
                    source,
                })?;
            let recorded = self.record(&planned, &mut seen, hint).await?;
            info!(
                address = %txn.address.short(),
                namespace = %txn.payload.namespace,
                version = txn.payload.version,
                suffixes = ?recorded,
                operations,
                "applied anchor"
            );
            applied += 1;
        }
        Ok(applied)
    }

    /// Index `planned` for each of its suffixes whose entry has not moved
    /// past it since the plan was made. Returns the suffixes written.
    async fn record(
        &self,
        planned: &PlannedAnchor,
        seen: &mut SeenEntries,
        hint: Option<&DiscoveryHint>,
    ) -> ObserverResult<Vec<String>> {
        let address = &planned.node.address;
        let _writes = self.index_writes.lock().await;
        let current = self.index.get_bulk(&planned.suffixes)?;

        let mut advancing = Vec::with_capacity(planned.suffixes.len());
        for (suffix, current) in planned.suffixes.iter().zip(current) {
            let last_seen = seen.get(suffix).and_then(Option::as_ref);
            if self
                .advances(suffix, current.as_ref(), last_seen, address, hint)
                .await?
            {
                advancing.push(suffix.clone());
            }
        }
        if advancing.is_empty() {
            return Ok(advancing);
        }

        self.index.put_bulk(&advancing, address)?;
        for suffix in &advancing {
            seen.insert(suffix.clone(), Some(address.clone()));
        }
        Ok(advancing)
    }

    /// Whether recording `address` for `suffix` moves its entry forward.
    async fn advances(
        &self,
        suffix: &str,
        current: Option<&ContentAddress>,
        last_seen: Option<&ContentAddress>,
        address: &ContentAddress,
        hint: Option<&DiscoveryHint>,
    ) -> ObserverResult<bool> {
        let Some(current) = current else {
            return Ok(true);
        };
        if Some(current) == last_seen {
            return Ok(true);
        }
        if current == address {
            return Ok(false);
        }
        // The other worker moved the entry while this plan was running.
        if self.graph.is_ancestor(current, address, suffix, hint).await? {
            return Ok(true);
        }
        debug!(
            suffix,
            address = %address.short(),
            recorded = %current.short(),
            "index already past planned anchor; leaving it"
        );
        Ok(false)
    }

    fn processor_for(&self, payload: &AnchorPayload) -> ObserverResult<Arc<dyn TransactionProcessor>> {
        let client = self
            .protocols
            .for_namespace(&payload.namespace)
            .ok_or_else(|| ObserverError::UnknownNamespace(payload.namespace.clone()))?;
        let version = client
            .get(payload.version)
            .ok_or_else(|| ObserverError::UnknownVersion {
                namespace: payload.namespace.clone(),
                version: payload.version,
            })?;
        Ok(version.transaction_processor())
    }
}
