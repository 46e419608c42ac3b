use serde::{Deserialize, Serialize};

use tether_graph::DEFAULT_MAX_DEPTH;

/// Observer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Discovery hint used for anchors that arrive without one, e.g.
    /// `webcas:shared.domain.com`.
    pub discovery_hint: Option<String>,
    /// Bound on the anchor history walked for a single suffix.
    pub max_history_depth: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            discovery_hint: None,
            max_history_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ObserverConfig {
    pub fn with_discovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.discovery_hint = Some(hint.into());
        self
    }
}
