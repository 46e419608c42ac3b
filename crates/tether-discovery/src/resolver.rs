use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::cache::LoadingCache;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::jrd::Jrd;
use crate::network::ContentNetwork;
use crate::transport::HttpFetcher;

/// Scheme prefix for peers named on the content network.
const IPNS_PREFIX: &str = "ipns://";

/// Directory resolver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// How long a fetched document stays cached, in seconds.
    pub cache_lifetime_secs: u64,
    /// Maximum number of cached documents.
    pub cache_size: usize,
    /// Path of the directory document under a peer's host.
    pub well_known_path: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cache_lifetime_secs: 300,
            cache_size: 100,
            well_known_path: "/.well-known/host-meta.json".to_string(),
        }
    }
}

impl DirectoryConfig {
    pub fn cache_lifetime(&self) -> Duration {
        Duration::from_secs(self.cache_lifetime_secs)
    }
}

/// Where a peer's directory document is read from.
#[derive(Debug, PartialEq, Eq)]
enum Location {
    Http(String),
    Network(String),
}

/// Resolves peer base addresses to advertised endpoints.
pub struct DirectoryResolver {
    config: DirectoryConfig,
    http: Arc<dyn HttpFetcher>,
    network: Option<Arc<dyn ContentNetwork>>,
    documents: LoadingCache<String, Arc<Jrd>>,
}

impl DirectoryResolver {
    pub fn new(
        config: DirectoryConfig,
        http: Arc<dyn HttpFetcher>,
        network: Option<Arc<dyn ContentNetwork>>,
    ) -> Self {
        let documents = LoadingCache::new(config.cache_size, config.cache_lifetime());
        Self {
            config,
            http,
            network,
            documents,
        }
    }

    /// Href of the first link of `link_type` in the peer's document.
    pub async fn resolve_link(&self, peer: &str, link_type: &str) -> DiscoveryResult<String> {
        let document = self.document(peer).await?;
        match document.first_link(link_type) {
            Some(link) => {
                debug!(peer, link_type, href = %link.href, "resolved link");
                Ok(link.href.clone())
            }
            None => Err(DiscoveryError::LinkNotFound {
                link_type: link_type.to_string(),
                url: self.location(peer)?.describe().to_string(),
            }),
        }
    }

    /// The peer's directory document, from cache or freshly fetched.
    pub async fn document(&self, peer: &str) -> DiscoveryResult<Arc<Jrd>> {
        self.documents
            .get_or_load(peer.to_string(), || async {
                let jrd = self.fetch(peer).await?;
                Ok(Arc::new(jrd))
            })
            .await
    }

    async fn fetch(&self, peer: &str) -> DiscoveryResult<Jrd> {
        let body = match self.location(peer)? {
            Location::Network(path) => match &self.network {
                Some(network) => network.cat(&path).await?,
                None => {
                    warn!(peer, "content network address without a content network");
                    return Err(DiscoveryError::ContentNetworkDisabled(peer.to_string()));
                }
            },
            Location::Http(url) => self.http.get(&url).await?,
        };
        Jrd::from_json(&body)
    }

    fn location(&self, peer: &str) -> DiscoveryResult<Location> {
        let well_known = &self.config.well_known_path;
        if let Some(name) = peer.strip_prefix(IPNS_PREFIX) {
            let name = name.trim_end_matches('/');
            if name.is_empty() {
                return Err(invalid(peer, "missing name"));
            }
            return Ok(Location::Network(format!("/ipns/{name}{well_known}")));
        }

        let url = Url::parse(peer).map_err(|e| invalid(peer, &e.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid(peer, "missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Location::Http(format!("{}://{authority}{well_known}", url.scheme())))
    }
}

impl Location {
    fn describe(&self) -> &str {
        match self {
            Self::Http(url) | Self::Network(url) => url,
        }
    }
}

fn invalid(address: &str, reason: &str) -> DiscoveryError {
    DiscoveryError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

impl std::fmt::Debug for DirectoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryResolver")
            .field("config", &self.config)
            .field("network_enabled", &self.network.is_some())
            .field("cached_documents", &self.documents.len())
            .finish()
    }
}
