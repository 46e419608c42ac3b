//! Contracts for the namespace-specific protocol layer.
//!
//! The observer never interprets an anchor's operations. It looks up the
//! protocol client for the anchor's namespace, picks the protocol version the
//! anchor declares, and hands the anchor to that version's
//! [`TransactionProcessor`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use tether_graph::AnchorNode;
use tether_types::{AnchorPayload, ContentAddress};

/// Failure reported by a transaction processor.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    /// Retrying later may succeed.
    #[error("transient: {0}")]
    Transient(String),

    /// The anchor can never be applied.
    #[error("permanent: {0}")]
    Permanent(String),
}

/// One anchor handed to a transaction processor.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorTxn {
    pub address: ContentAddress,
    pub issuer: String,
    pub payload: AnchorPayload,
}

impl From<&AnchorNode> for AnchorTxn {
    fn from(node: &AnchorNode) -> Self {
        Self {
            address: node.address.clone(),
            issuer: node.credential.issuer.clone(),
            payload: node.credential.payload().clone(),
        }
    }
}

/// Applies one anchor's operations for the given suffixes.
///
/// Must be idempotent per anchor: a redelivered event may present an anchor
/// that was applied before the index recorded it.
#[async_trait]
pub trait TransactionProcessor: Send + Sync {
    /// Returns the number of operations applied.
    async fn process(&self, txn: &AnchorTxn, suffixes: &[String]) -> Result<usize, ProcessError>;
}

/// One protocol version of a namespace.
pub trait ProtocolVersion: Send + Sync {
    fn version(&self) -> u64;

    fn transaction_processor(&self) -> Arc<dyn TransactionProcessor>;
}

/// All protocol versions of one namespace.
pub trait ProtocolClient: Send + Sync {
    fn get(&self, version: u64) -> Option<Arc<dyn ProtocolVersion>>;
}

/// Namespace -> protocol client.
pub trait ProtocolClientProvider: Send + Sync {
    fn for_namespace(&self, namespace: &str) -> Option<Arc<dyn ProtocolClient>>;
}

/// A protocol version wrapping a fixed processor.
pub struct StaticProtocolVersion {
    version: u64,
    processor: Arc<dyn TransactionProcessor>,
}

impl StaticProtocolVersion {
    pub fn new(version: u64, processor: Arc<dyn TransactionProcessor>) -> Self {
        Self { version, processor }
    }
}

impl ProtocolVersion for StaticProtocolVersion {
    fn version(&self) -> u64 {
        self.version
    }

    fn transaction_processor(&self) -> Arc<dyn TransactionProcessor> {
        Arc::clone(&self.processor)
    }
}

/// Protocol client holding versions keyed by number.
#[derive(Default)]
pub struct VersionedProtocolClient {
    versions: BTreeMap<u64, Arc<dyn ProtocolVersion>>,
}

impl VersionedProtocolClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: Arc<dyn ProtocolVersion>) -> Self {
        self.versions.insert(version.version(), version);
        self
    }
}

impl ProtocolClient for VersionedProtocolClient {
    fn get(&self, version: u64) -> Option<Arc<dyn ProtocolVersion>> {
        self.versions.get(&version).cloned()
    }
}

/// Provider backed by a fixed namespace table.
#[derive(Default)]
pub struct StaticProtocolClientProvider {
    clients: HashMap<String, Arc<dyn ProtocolClient>>,
}

impl StaticProtocolClientProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, namespace: impl Into<String>, client: Arc<dyn ProtocolClient>) -> Self {
        self.clients.insert(namespace.into(), client);
        self
    }

    /// Provider with a single namespace whose version `version` uses `processor`.
    pub fn single(namespace: impl Into<String>, version: u64, processor: Arc<dyn TransactionProcessor>) -> Self {
        let client = VersionedProtocolClient::new()
            .with_version(Arc::new(StaticProtocolVersion::new(version, processor)));
        Self::new().with_client(namespace, Arc::new(client))
    }
}

impl ProtocolClientProvider for StaticProtocolClientProvider {
    fn for_namespace(&self, namespace: &str) -> Option<Arc<dyn ProtocolClient>> {
        self.clients.get(namespace).cloned()
    }
}
