use tether_cas::CasError;
use tether_types::{Classify, ContentAddress, ErrorClass};

/// Errors from anchor graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The anchor a walk or read started from could not be found.
    #[error("anchor not found: {0}")]
    AnchorNotFound(ContentAddress),

    /// An anchor links to a previous anchor that could not be found.
    #[error("anchor {anchor} links to missing anchor {missing} for suffix {suffix}")]
    MissingLink {
        anchor: ContentAddress,
        missing: ContentAddress,
        suffix: String,
    },

    /// Bytes at the address are not a valid anchor credential.
    #[error("malformed anchor {address}: {reason}")]
    Malformed {
        address: ContentAddress,
        reason: String,
    },

    /// A history walk did not terminate within the depth bound.
    #[error("history for suffix {suffix} exceeds {max_depth} anchors")]
    DepthExceeded { suffix: String, max_depth: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("resolver error: {0}")]
    Resolver(#[from] CasError),
}

impl Classify for GraphError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::AnchorNotFound(_) => ErrorClass::NotFound,
            // The missing anchor may live on a peer that is not reachable yet.
            Self::MissingLink { .. } => ErrorClass::Transient,
            Self::Malformed { .. } | Self::DepthExceeded { .. } | Self::Serialization(_) => {
                ErrorClass::Malformed
            }
            Self::Resolver(e) => e.class(),
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
