use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::map_reqwest_error;

/// Read access to the distributed content network.
///
/// Paths are network paths such as `/ipfs/<address>` or
/// `/ipns/<name>/.well-known/host-meta.json`.
#[async_trait]
pub trait ContentNetwork: Send + Sync {
    async fn cat(&self, path: &str) -> DiscoveryResult<Vec<u8>>;
}

/// Connection settings for a content-network HTTP API node.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentNetworkConfig {
    /// Base URL of the node's HTTP API, e.g. `http://127.0.0.1:5001`.
    pub api_url: String,
    /// Read timeout applied to every request, in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ContentNetworkConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".to_string(),
            read_timeout_secs: 20,
        }
    }
}

impl ContentNetworkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// [`ContentNetwork`] client speaking the node HTTP API (`/api/v0/cat`).
#[derive(Clone, Debug)]
pub struct IpfsHttpClient {
    endpoint: Url,
    client: reqwest::Client,
    read_timeout: Duration,
}

impl IpfsHttpClient {
    pub fn new(config: &ContentNetworkConfig) -> DiscoveryResult<Self> {
        let base = Url::parse(&config.api_url).map_err(|e| DiscoveryError::InvalidAddress {
            address: config.api_url.clone(),
            reason: e.to_string(),
        })?;
        let endpoint = base
            .join("api/v0/cat")
            .map_err(|e| DiscoveryError::InvalidAddress {
                address: config.api_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::new(),
            read_timeout: config.read_timeout(),
        })
    }

    fn cat_url(&self, path: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("arg", path);
        url
    }
}

#[async_trait]
impl ContentNetwork for IpfsHttpClient {
    async fn cat(&self, path: &str) -> DiscoveryResult<Vec<u8>> {
        let url = self.cat_url(path);
        debug!(path, "content network cat");
        let resp = self
            .client
            .post(url.as_str())
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(path, e))?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(DiscoveryError::status(path, status));
        }
        let body = resp.bytes().await.map_err(|e| map_reqwest_error(path, e))?;
        Ok(body.to_vec())
    }
}

/// In-memory [`ContentNetwork`] keyed by path, counting every call.
#[derive(Debug, Default)]
pub struct StaticContentNetwork {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
}

impl StaticContentNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .expect("network lock poisoned")
            .insert(path.into(), data.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentNetwork for StaticContentNetwork {
    async fn cat(&self, path: &str) -> DiscoveryResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .expect("network lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| DiscoveryError::status(path, 404))
    }
}
