use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use tether_cas::ContentResolver;
use tether_discovery::{
    ContentNetwork, DirectoryResolver, DiscoveryResult, HttpFetcher, IpfsHttpClient, ReferenceIterator,
    ReqwestFetcher,
};
use tether_graph::AnchorGraph;
use tether_observer::{
    AnchorTxn, ProcessError, StaticProtocolClientProvider, StaticProtocolVersion, TransactionProcessor,
    VersionedProtocolClient,
};
use tether_store::FsContentStore;

use crate::config::NodeConfig;

/// The read side of a node: store, resolvers and anchor graph.
pub struct Node {
    pub http: Arc<dyn HttpFetcher>,
    pub directory: Arc<DirectoryResolver>,
    pub resolver: Arc<ContentResolver>,
    pub graph: Arc<AnchorGraph>,
}

impl Node {
    pub fn open(config: &NodeConfig) -> anyhow::Result<Self> {
        let store = Arc::new(FsContentStore::open(&config.store_path)?);
        let http: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(config.http_timeout())?);
        let network: Option<Arc<dyn ContentNetwork>> = if config.content_network_enabled {
            Some(Arc::new(IpfsHttpClient::new(&config.content_network)?))
        } else {
            None
        };

        let directory = Arc::new(DirectoryResolver::new(
            config.directory.clone(),
            Arc::clone(&http),
            network.clone(),
        ));
        let mut resolver = ContentResolver::new(store, Arc::clone(&http))
            .with_directory(Arc::clone(&directory))
            .with_config(config.resolver.clone());
        if let Some(network) = network {
            resolver = resolver.with_network(network);
        }
        let resolver = Arc::new(resolver);
        let graph = Arc::new(
            AnchorGraph::new(Arc::clone(&resolver)).with_max_depth(config.observer.max_history_depth),
        );

        Ok(Self {
            http,
            directory,
            resolver,
            graph,
        })
    }
}

/// References listed by the document at `url`, at most `limit` of them,
/// together with the collection's advertised size.
pub async fn list_references(
    http: Arc<dyn HttpFetcher>,
    url: &str,
    limit: Option<usize>,
) -> DiscoveryResult<(Option<u64>, Vec<String>)> {
    let mut iter = ReferenceIterator::open(http, url).await?;
    let mut references = Vec::new();
    while limit.map_or(true, |limit| references.len() < limit) {
        match iter.next().await? {
            Some(reference) => references.push(reference),
            None => break,
        }
    }
    Ok((iter.total_items(), references))
}

/// Processor that records applied anchors in the log and nothing else.
pub struct LoggingProcessor;

#[async_trait]
impl TransactionProcessor for LoggingProcessor {
    async fn process(&self, txn: &AnchorTxn, suffixes: &[String]) -> Result<usize, ProcessError> {
        info!(
            address = %txn.address,
            issuer = %txn.issuer,
            namespace = %txn.payload.namespace,
            version = txn.payload.version,
            core_index = %txn.payload.core_index,
            suffixes = ?suffixes,
            "anchor ready for application"
        );
        Ok(txn.payload.operation_count as usize)
    }
}

/// Every configured namespace and version served by `processor`.
pub fn protocol_provider(
    config: &NodeConfig,
    processor: Arc<dyn TransactionProcessor>,
) -> StaticProtocolClientProvider {
    config
        .namespaces
        .iter()
        .fold(StaticProtocolClientProvider::new(), |provider, namespace| {
            let client = config
                .protocol_versions
                .iter()
                .fold(VersionedProtocolClient::new(), |client, &version| {
                    client.with_version(Arc::new(StaticProtocolVersion::new(
                        version,
                        Arc::clone(&processor),
                    )))
                });
            provider.with_client(namespace.clone(), Arc::new(client))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_observer::ProtocolClientProvider;

    fn config_in(dir: &std::path::Path) -> NodeConfig {
        NodeConfig {
            store_path: dir.join("cas"),
            index_path: dir.join("index.log"),
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn open_node_writes_and_resolves_locally() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::open(&config_in(dir.path())).unwrap();
        let address = node.resolver.write(b"hello tether").unwrap();
        let (bytes, source) = node.resolver.resolve_with_source(&address, None).await.unwrap();
        assert_eq!(bytes, b"hello tether");
        assert_eq!(source, tether_cas::Source::Local);
    }

    #[tokio::test]
    async fn content_network_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.content_network_enabled = true;
        assert!(Node::open(&config).is_ok());
        config.content_network.api_url = "not a url".into();
        assert!(Node::open(&config).is_err());
    }

    #[tokio::test]
    async fn references_page_through_collection() {
        let http = Arc::new(tether_discovery::StaticFetcher::new());
        http.serve(
            "https://peer/followers",
            br#"{"type":"OrderedCollection","totalItems":3,"first":"https://peer/followers?page=1"}"#.to_vec(),
        );
        http.serve(
            "https://peer/followers?page=1",
            br#"{"type":"OrderedCollectionPage","orderedItems":["https://a","https://b"],"next":"https://peer/followers?page=2"}"#.to_vec(),
        );
        http.serve(
            "https://peer/followers?page=2",
            br#"{"type":"OrderedCollectionPage","orderedItems":[{"id":"https://c"}]}"#.to_vec(),
        );

        let (total, refs) = list_references(http.clone(), "https://peer/followers", None)
            .await
            .unwrap();
        assert_eq!(total, Some(3));
        assert_eq!(refs, vec!["https://a", "https://b", "https://c"]);

        let calls = http.calls();
        let (_, refs) = list_references(http.clone(), "https://peer/followers", Some(1))
            .await
            .unwrap();
        assert_eq!(refs, vec!["https://a"]);
        assert_eq!(http.calls() - calls, 2);
    }

    #[tokio::test]
    async fn references_reject_unknown_documents() {
        let http = Arc::new(tether_discovery::StaticFetcher::new());
        http.serve("https://peer/note", br#"{"type":"Note","id":"https://peer/note"}"#.to_vec());
        assert!(list_references(http, "https://peer/note", None).await.is_err());
    }

    #[test]
    fn provider_covers_configured_versions() {
        let mut config = NodeConfig::default();
        config.namespaces = vec!["did:a".into(), "did:b".into()];
        config.protocol_versions = vec![1, 2];
        let provider = protocol_provider(&config, Arc::new(LoggingProcessor));
        for ns in ["did:a", "did:b"] {
            let client = provider.for_namespace(ns).unwrap();
            assert!(client.get(1).is_some());
            assert!(client.get(2).is_some());
            assert!(client.get(3).is_none());
        }
        assert!(provider.for_namespace("did:c").is_none());
    }
}
