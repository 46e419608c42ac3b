use tether_graph::GraphError;
use tether_index::IndexError;
use tether_pubsub::PubSubError;
use tether_types::{Classify, ContentAddress, ErrorClass, TypeError};

use crate::protocol::ProcessError;

/// Errors from observing and applying anchors.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// An event payload could not be decoded.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] TypeError),

    /// The configured default discovery hint does not parse.
    #[error("invalid discovery hint {hint}: {source}")]
    InvalidHint {
        hint: String,
        #[source]
        source: TypeError,
    },

    #[error("no protocol client for namespace {0}")]
    UnknownNamespace(String),

    #[error("namespace {namespace} has no protocol version {version}")]
    UnknownVersion { namespace: String, version: u64 },

    #[error("transaction processor failed for anchor {address}: {source}")]
    Process {
        address: ContentAddress,
        #[source]
        source: ProcessError,
    },

    /// The anchor and the already-applied anchor for a suffix are on
    /// diverging branches.
    #[error("ambiguous history for suffix {suffix}: anchor {anchor} does not descend from applied anchor {applied}")]
    AmbiguousHistory {
        suffix: String,
        anchor: ContentAddress,
        applied: ContentAddress,
    },

    /// Per-suffix histories contradict each other's ordering.
    #[error("anchor histories form a cycle at {0}")]
    HistoryCycle(ContentAddress),

    /// Subscribing to a stream failed while constructing the observer.
    #[error("failed to subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: PubSubError,
    },

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("pub/sub error: {0}")]
    PubSub(#[from] PubSubError),
}

impl Classify for ObserverError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidEvent(e) => e.class(),
            Self::InvalidHint { .. }
            | Self::UnknownNamespace(_)
            | Self::UnknownVersion { .. }
            | Self::AmbiguousHistory { .. }
            | Self::HistoryCycle(_) => ErrorClass::Malformed,
            Self::Process { source, .. } => match source {
                ProcessError::Transient(_) => ErrorClass::Transient,
                ProcessError::Permanent(_) => ErrorClass::Malformed,
            },
            Self::Subscribe { .. } => ErrorClass::Transient,
            Self::Graph(e) => e.class(),
            Self::Index(_) => ErrorClass::Transient,
            Self::PubSub(e) => e.class(),
        }
    }
}

pub type ObserverResult<T> = Result<T, ObserverError>;
