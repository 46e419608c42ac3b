use tether_types::{Classify, ErrorClass};

/// Errors from discovery and remote transport operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("got status code {status} from {url} (expected 200)")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("no links with type {link_type} were found via {url}")]
    LinkNotFound { link_type: String, url: String },

    #[error("unable to resolve {0} since the content network is not enabled")]
    ContentNetworkDisabled(String),

    #[error("invalid peer address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unsupported document type: {0}")]
    UnknownType(String),
}

impl DiscoveryError {
    pub(crate) fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }
}

impl Classify for DiscoveryError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Status { status, .. } => match status {
                408 | 429 => ErrorClass::Transient,
                s if *s >= 500 => ErrorClass::Transient,
                _ => ErrorClass::NotFound,
            },
            Self::Transport { .. } | Self::Timeout { .. } => ErrorClass::Transient,
            Self::LinkNotFound { .. } | Self::ContentNetworkDisabled(_) => ErrorClass::NotFound,
            Self::InvalidAddress { .. } | Self::Decode(_) | Self::UnknownType(_) => {
                ErrorClass::Malformed
            }
        }
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(DiscoveryError::status("u", 404).class(), ErrorClass::NotFound);
        assert_eq!(DiscoveryError::status("u", 503).class(), ErrorClass::Transient);
        assert_eq!(DiscoveryError::status("u", 429).class(), ErrorClass::Transient);
        assert_eq!(DiscoveryError::status("u", 403).class(), ErrorClass::NotFound);
    }

    #[test]
    fn message_mentions_expected_status() {
        let err = DiscoveryError::status("https://a.b/x", 500);
        assert_eq!(err.to_string(), "got status code 500 from https://a.b/x (expected 200)");
    }

    #[test]
    fn decode_is_malformed() {
        assert_eq!(DiscoveryError::Decode("x".into()).class(), ErrorClass::Malformed);
        assert!(!DiscoveryError::UnknownType("Note".into()).class().is_retryable());
    }
}
