use tether_types::{Classify, ContentAddress, ErrorClass};

/// Errors from local content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Stored bytes no longer hash to their address.
    #[error("hash mismatch for {address}: stored content hashes to {computed}")]
    HashMismatch {
        address: ContentAddress,
        computed: ContentAddress,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl Classify for StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::HashMismatch { .. } => ErrorClass::IntegrityViolation,
            Self::Io(_) | Self::Poisoned => ErrorClass::Transient,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
