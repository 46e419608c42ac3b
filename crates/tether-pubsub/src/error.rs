use tether_types::{Classify, ErrorClass};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PubSubError {
    #[error("pub/sub is closed")]
    Closed,

    #[error("subscription to {0} failed: {1}")]
    Subscribe(String, String),

    #[error("publish to {0} failed: {1}")]
    Publish(String, String),
}

impl Classify for PubSubError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Transient
    }
}

pub type PubSubResult<T> = Result<T, PubSubError>;
