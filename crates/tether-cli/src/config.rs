use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use tether_cas::ResolverConfig;
use tether_discovery::{ContentNetworkConfig, DirectoryConfig};
use tether_index::LogConfig;
use tether_observer::ObserverConfig;
use tether_pubsub::PubSubConfig;

/// Everything a node needs, loaded from a single TOML file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory of the local content store.
    pub store_path: PathBuf,
    /// DID-anchor index log file.
    pub index_path: PathBuf,
    /// Timeout for outbound HTTP requests, in seconds.
    pub http_timeout_secs: u64,
    /// Read through a content-network API node.
    pub content_network_enabled: bool,
    /// Namespaces the node applies anchors for.
    pub namespaces: Vec<String>,
    /// Protocol versions accepted in every namespace.
    pub protocol_versions: Vec<u64>,
    pub directory: DirectoryConfig,
    pub content_network: ContentNetworkConfig,
    pub resolver: ResolverConfig,
    pub index: LogConfig,
    pub pubsub: PubSubConfig,
    pub observer: ObserverConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/cas"),
            index_path: PathBuf::from("data/did-anchors.log"),
            http_timeout_secs: 30,
            content_network_enabled: false,
            namespaces: vec!["did:tether".to_string()],
            protocol_versions: vec![1],
            directory: DirectoryConfig::default(),
            content_network: ContentNetworkConfig::default(),
            resolver: ResolverConfig::default(),
            index: LogConfig::default(),
            pubsub: PubSubConfig::default(),
            observer: ObserverConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
