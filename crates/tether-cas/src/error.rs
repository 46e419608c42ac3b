use tether_discovery::DiscoveryError;
use tether_store::StoreError;
use tether_types::{Classify, ContentAddress, ErrorClass};

/// Errors from content resolution.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// Not held locally and no hint to look elsewhere.
    #[error("content not found: {0}")]
    NotFound(ContentAddress),

    /// Remote bytes do not hash to the requested address.
    #[error("integrity violation: requested {address}, received content hashing to {computed}")]
    IntegrityViolation {
        address: ContentAddress,
        computed: ContentAddress,
    },

    #[error("content network is not enabled")]
    ContentNetworkDisabled,

    #[error("directory resolution is not enabled")]
    DirectoryDisabled,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

impl Classify for CasError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) | Self::ContentNetworkDisabled | Self::DirectoryDisabled => {
                ErrorClass::NotFound
            }
            Self::IntegrityViolation { .. } => ErrorClass::IntegrityViolation,
            Self::Store(e) => e.class(),
            Self::Discovery(e) => e.class(),
        }
    }
}

pub type CasResult<T> = Result<T, CasError>;
