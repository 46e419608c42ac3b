use std::fmt;

use crate::error::TypeError;

/// Where to look for content that is not held locally.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiscoveryHint {
    /// `webcas:<domain>`: the peer's CAS gateway is discovered through its
    /// directory document.
    WebCas { domain: String },
    /// `ipfs` or `ipfs://...`: read through the distributed content network.
    ContentNetwork,
    /// `http(s)://<base>`: a CAS gateway whose objects live at `<base>/<address>`.
    Gateway(String),
}

impl DiscoveryHint {
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if let Some(domain) = s.strip_prefix("webcas:") {
            if domain.is_empty() || domain.contains('/') {
                return Err(TypeError::InvalidHint(s.to_string()));
            }
            return Ok(Self::WebCas { domain: domain.to_string() });
        }
        if s == "ipfs" || s.starts_with("ipfs:") {
            return Ok(Self::ContentNetwork);
        }
        if s.starts_with("https://") || s.starts_with("http://") {
            return Ok(Self::Gateway(s.trim_end_matches('/').to_string()));
        }
        Err(TypeError::InvalidHint(s.to_string()))
    }
}

impl fmt::Display for DiscoveryHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebCas { domain } => write!(f, "webcas:{domain}"),
            Self::ContentNetwork => f.write_str("ipfs"),
            Self::Gateway(base) => f.write_str(base),
        }
    }
}
