use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};

/// A peer's directory document (JSON Resource Descriptor).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Jrd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// One advertised endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default)]
    pub href: String,
}

impl Link {
    pub fn new(link_type: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: Some("self".to_string()),
            link_type: Some(link_type.into()),
            href: href.into(),
        }
    }
}

impl Jrd {
    pub fn from_json(data: &[u8]) -> DiscoveryResult<Self> {
        serde_json::from_slice(data).map_err(|e| DiscoveryError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> DiscoveryResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DiscoveryError::Decode(e.to_string()))
    }

    /// First link, in document order, whose type equals `link_type`.
    pub fn first_link(&self, link_type: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.link_type.as_deref() == Some(link_type))
    }
}
