use tether_types::{Classify, ErrorClass};

/// Errors from DID-anchor index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Injected or backend-specific failure.
    #[error("index unavailable: {0}")]
    Unavailable(String),
}

impl Classify for IndexError {
    /// Every index failure is worth retrying.
    fn class(&self) -> ErrorClass {
        ErrorClass::Transient
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
