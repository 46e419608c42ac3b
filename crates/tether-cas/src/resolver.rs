use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tether_discovery::{ContentNetwork, DirectoryResolver, HttpFetcher, SingleFlight};
use tether_store::ContentStore;
use tether_types::{ContentAddress, DiscoveryHint, MetricsSink, NoopMetrics};

use crate::error::{CasError, CasResult};

/// Link type a peer uses to advertise its CAS gateway.
pub const CAS_LINK_TYPE: &str = "application/cas+json";

/// Content resolver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Scheme used to reach a `webcas:<domain>` peer's directory.
    pub webcas_scheme: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            webcas_scheme: "https".to_string(),
        }
    }
}

/// Which source served a resolved object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Local,
    WebCas,
    ContentNetwork,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::WebCas => "webcas",
            Self::ContentNetwork => "ipfs",
        }
    }
}

/// Local-first content resolver.
pub struct ContentResolver {
    store: Arc<dyn ContentStore>,
    http: Arc<dyn HttpFetcher>,
    directory: Option<Arc<DirectoryResolver>>,
    network: Option<Arc<dyn ContentNetwork>>,
    config: ResolverConfig,
    metrics: Arc<dyn MetricsSink>,
    fetches: SingleFlight<ContentAddress, Vec<u8>>,
}

impl ContentResolver {
    pub fn new(store: Arc<dyn ContentStore>, http: Arc<dyn HttpFetcher>) -> Self {
        Self {
            store,
            http,
            directory: None,
            network: None,
            config: ResolverConfig::default(),
            metrics: Arc::new(NoopMetrics),
            fetches: SingleFlight::new(),
        }
    }

    pub fn with_directory(mut self, directory: Arc<DirectoryResolver>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_network(mut self, network: Arc<dyn ContentNetwork>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Store `data` locally and return its address.
    pub fn write(&self, data: &[u8]) -> CasResult<ContentAddress> {
        let start = Instant::now();
        let address = self.store.put(data)?;
        self.metrics.cas_write_time(start.elapsed());
        debug!(address = %address.short(), len = data.len(), "wrote content");
        Ok(address)
    }

    /// Bytes for `address`, from the local store or the hinted remote.
    pub async fn resolve(
        &self,
        address: &ContentAddress,
        hint: Option<&DiscoveryHint>,
    ) -> CasResult<Vec<u8>> {
        self.resolve_with_source(address, hint).await.map(|(data, _)| data)
    }

    /// Like [`resolve`](Self::resolve), also reporting which source served
    /// the bytes.
    pub async fn resolve_with_source(
        &self,
        address: &ContentAddress,
        hint: Option<&DiscoveryHint>,
    ) -> CasResult<(Vec<u8>, Source)> {
        let start = Instant::now();

        if let Some(data) = self.store.get(address)? {
            self.metrics.cas_read_time(Source::Local.as_str(), start.elapsed());
            self.metrics.cas_cache_hit();
            self.metrics.cas_resolve_time(start.elapsed());
            return Ok((data, Source::Local));
        }

        let Some(hint) = hint else {
            return Err(CasError::NotFound(address.clone()));
        };

        let source = self.source_for(hint);
        let data = self
            .fetches
            .run(address.clone(), || self.fetch_remote(address, hint))
            .await?;
        self.metrics.cas_resolve_time(start.elapsed());
        Ok((data, source))
    }

    fn source_for(&self, hint: &DiscoveryHint) -> Source {
        match hint {
            DiscoveryHint::ContentNetwork => Source::ContentNetwork,
            DiscoveryHint::WebCas { .. } | DiscoveryHint::Gateway(_) => Source::WebCas,
        }
    }

    async fn fetch_remote(&self, address: &ContentAddress, hint: &DiscoveryHint) -> CasResult<Vec<u8>> {
        let start = Instant::now();
        let data = match hint {
            DiscoveryHint::WebCas { domain } => {
                let directory = self.directory.as_ref().ok_or(CasError::DirectoryDisabled)?;
                let peer = format!("{}://{domain}", self.config.webcas_scheme);
                let base = directory.resolve_link(&peer, CAS_LINK_TYPE).await?;
                self.http.get(&object_url(&base, address)).await?
            }
            DiscoveryHint::Gateway(base) => self.http.get(&object_url(base, address)).await?,
            DiscoveryHint::ContentNetwork => {
                let network = self.network.as_ref().ok_or(CasError::ContentNetworkDisabled)?;
                network.cat(&format!("/ipfs/{address}")).await?
            }
        };
        self.metrics
            .cas_read_time(self.source_for(hint).as_str(), start.elapsed());

        let computed = ContentAddress::of(&data);
        if computed != *address {
            warn!(address = %address, computed = %computed, hint = %hint, "remote content failed verification");
            return Err(CasError::IntegrityViolation {
                address: address.clone(),
                computed,
            });
        }

        self.store.put(&data)?;
        debug!(address = %address.short(), hint = %hint, "cached remote content");
        Ok(data)
    }
}

fn object_url(base: &str, address: &ContentAddress) -> String {
    format!("{}/{}", base.trim_end_matches('/'), address)
}

impl std::fmt::Debug for ContentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentResolver")
            .field("config", &self.config)
            .field("directory_enabled", &self.directory.is_some())
            .field("network_enabled", &self.network.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tether_discovery::{
        DirectoryConfig, DiscoveryResult, Jrd, Link, StaticContentNetwork, StaticFetcher,
    };
    use tether_store::InMemoryContentStore;
    use tether_types::{Classify, ErrorClass};

    const PEER_META: &str = "https://peer.example.com/.well-known/host-meta.json";
    const PEER_CAS: &str = "https://peer.example.com/cas";

    #[derive(Default)]
    struct CountingMetrics {
        hits: AtomicUsize,
        writes: AtomicUsize,
        remote_reads: AtomicUsize,
    }

    impl MetricsSink for CountingMetrics {
        fn cas_cache_hit(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        fn cas_write_time(&self, _elapsed: Duration) {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        fn cas_read_time(&self, source: &str, _elapsed: Duration) {
            if source != "local" {
                self.remote_reads.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn peer_fetcher(object: &[u8]) -> Arc<StaticFetcher> {
        let http = Arc::new(StaticFetcher::new());
        let jrd = Jrd {
            links: vec![Link::new(CAS_LINK_TYPE, PEER_CAS)],
            ..Default::default()
        };
        http.serve(PEER_META, jrd.to_json().unwrap());
        http.serve(format!("{PEER_CAS}/{}", ContentAddress::of(object)), object.to_vec());
        http
    }

    fn resolver_with(http: Arc<StaticFetcher>) -> ContentResolver {
        let directory = Arc::new(DirectoryResolver::new(
            DirectoryConfig::default(),
            http.clone(),
            None,
        ));
        ContentResolver::new(Arc::new(InMemoryContentStore::new()), http).with_directory(directory)
    }

    fn webcas() -> DiscoveryHint {
        DiscoveryHint::parse("webcas:peer.example.com").unwrap()
    }

    // ------------------------------------------------------------------
    // Local
    // ------------------------------------------------------------------

    #[test]
    fn write_is_deterministic() {
        let resolver = resolver_with(Arc::new(StaticFetcher::new()));
        let a = resolver.write(b"credential").unwrap();
        let b = resolver.write(b"credential").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, ContentAddress::of(b"credential"));
    }

    #[tokio::test]
    async fn local_hit_skips_remote() {
        let http = Arc::new(StaticFetcher::new());
        let metrics = Arc::new(CountingMetrics::default());
        let resolver = resolver_with(http.clone()).with_metrics(metrics.clone());
        let addr = resolver.write(b"local").unwrap();

        let (data, source) = resolver.resolve_with_source(&addr, Some(&webcas())).await.unwrap();
        assert_eq!(data, b"local");
        assert_eq!(source, Source::Local);
        assert_eq!(http.calls(), 0);
        assert_eq!(metrics.hits.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn miss_without_hint_is_not_found() {
        let resolver = resolver_with(Arc::new(StaticFetcher::new()));
        let err = resolver.resolve(&ContentAddress::of(b"x"), None).await.unwrap_err();
        assert!(matches!(err, CasError::NotFound(_)));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    // ------------------------------------------------------------------
    // Remote
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn webcas_resolution_caches_locally() {
        let object = b"anchor credential held only by a peer";
        let addr = ContentAddress::of(object);
        let http = peer_fetcher(object);
        let metrics = Arc::new(CountingMetrics::default());
        let resolver = resolver_with(http.clone()).with_metrics(metrics.clone());

        let (data, source) = resolver.resolve_with_source(&addr, Some(&webcas())).await.unwrap();
        assert_eq!(data, object);
        assert_eq!(source, Source::WebCas);
        assert_eq!(http.calls(), 2);
        assert!(resolver.store().contains(&addr).unwrap());

        let (again, source) = resolver.resolve_with_source(&addr, Some(&webcas())).await.unwrap();
        assert_eq!(again, object);
        assert_eq!(source, Source::Local);
        assert_eq!(http.calls(), 2);
        assert_eq!(metrics.remote_reads.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gateway_hint_fetches_directly() {
        let object = b"gateway object";
        let http = peer_fetcher(object);
        let resolver = resolver_with(http.clone());
        let hint = DiscoveryHint::parse(PEER_CAS).unwrap();
        let data = resolver.resolve(&ContentAddress::of(object), Some(&hint)).await.unwrap();
        assert_eq!(data, object);
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn content_network_hint_reads_ipfs_path() {
        let object = b"network object";
        let addr = ContentAddress::of(object);
        let net = Arc::new(StaticContentNetwork::new());
        net.insert(format!("/ipfs/{addr}"), object.to_vec());
        let resolver = ContentResolver::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(StaticFetcher::new()),
        )
        .with_network(net.clone());

        let (data, source) = resolver
            .resolve_with_source(&addr, Some(&DiscoveryHint::ContentNetwork))
            .await
            .unwrap();
        assert_eq!(data, object);
        assert_eq!(source, Source::ContentNetwork);
        assert_eq!(net.calls(), 1);
    }

    #[tokio::test]
    async fn content_network_hint_without_network() {
        let resolver = ContentResolver::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(StaticFetcher::new()),
        );
        let err = resolver
            .resolve(&ContentAddress::of(b"x"), Some(&DiscoveryHint::ContentNetwork))
            .await
            .unwrap_err();
        assert!(matches!(err, CasError::ContentNetworkDisabled));
    }

    #[tokio::test]
    async fn tampered_remote_content_is_rejected_and_not_cached() {
        let addr = ContentAddress::of(b"expected");
        let http = peer_fetcher(b"unrelated");
        http.serve(format!("{PEER_CAS}/{addr}"), b"tampered".to_vec());
        let resolver = resolver_with(http);

        let err = resolver.resolve(&addr, Some(&webcas())).await.unwrap_err();
        assert!(matches!(err, CasError::IntegrityViolation { .. }));
        assert_eq!(err.class(), ErrorClass::IntegrityViolation);
        assert!(!resolver.store().contains(&addr).unwrap());
    }

    #[tokio::test]
    async fn remote_missing_is_not_found() {
        let http = peer_fetcher(b"something else");
        let resolver = resolver_with(http);
        let err = resolver
            .resolve(&ContentAddress::of(b"absent"), Some(&webcas()))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn remote_unavailable_is_transient() {
        let addr = ContentAddress::of(b"obj");
        let http = peer_fetcher(b"other");
        http.respond(format!("{PEER_CAS}/{addr}"), 503, Vec::new());
        let resolver = resolver_with(http);
        let err = resolver.resolve(&addr, Some(&webcas())).await.unwrap_err();
        assert!(err.class().is_retryable());
    }

    struct SlowFetcher {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpFetcher for SlowFetcher {
        async fn get(&self, _url: &str) -> DiscoveryResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(self.body.clone())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_one_fetch() {
        let object = b"popular".to_vec();
        let addr = ContentAddress::of(&object);
        let http = Arc::new(SlowFetcher {
            body: object.clone(),
            calls: AtomicUsize::new(0),
        });
        let resolver = Arc::new(ContentResolver::new(Arc::new(InMemoryContentStore::new()), http.clone()));
        let hint = DiscoveryHint::Gateway("https://gw.example.com".into());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let resolver = Arc::clone(&resolver);
            let addr = addr.clone();
            let hint = hint.clone();
            handles.push(tokio::spawn(async move { resolver.resolve(&addr, Some(&hint)).await }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), object);
        }
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn webcas_against_live_peer() {
        use axum::extract::Path;
        use axum::routing::get;
        use axum::Router;

        let object = b"served over http".to_vec();
        let addr = ContentAddress::of(&object);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        let meta = Jrd {
            links: vec![Link::new(CAS_LINK_TYPE, format!("http://{local}/cas"))],
            ..Default::default()
        }
        .to_json()
        .unwrap();
        let served = object.clone();
        let app = Router::new()
            .route("/.well-known/host-meta.json", get(move || async move { meta }))
            .route(
                "/cas/:address",
                get(move |Path(_address): Path<String>| {
                    let served = served.clone();
                    async move { served }
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let http: Arc<dyn HttpFetcher> =
            Arc::new(tether_discovery::ReqwestFetcher::new(Duration::from_secs(5)).unwrap());
        let directory = Arc::new(DirectoryResolver::new(DirectoryConfig::default(), http.clone(), None));
        let resolver = ContentResolver::new(Arc::new(InMemoryContentStore::new()), http)
            .with_directory(directory)
            .with_config(ResolverConfig {
                webcas_scheme: "http".into(),
            });

        let hint = DiscoveryHint::parse(&format!("webcas:{local}")).unwrap();
        let data = resolver.resolve(&addr, Some(&hint)).await.unwrap();
        assert_eq!(data, object);
    }
}
