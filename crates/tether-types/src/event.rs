use std::fmt;

use crate::address::ContentAddress;
use crate::error::TypeError;

/// "This identifier was affected by that anchor", as carried on the DID
/// stream in the form `<address>:<suffix>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DidEvent {
    pub address: ContentAddress,
    pub suffix: String,
}

impl DidEvent {
    pub fn new(address: ContentAddress, suffix: impl Into<String>) -> Self {
        Self { address, suffix: suffix.into() }
    }

    /// Split at the last `:`. A missing separator or an empty suffix is
    /// malformed and never worth retrying.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (address, suffix) = s
            .rsplit_once(':')
            .ok_or_else(|| TypeError::InvalidDidEvent(s.to_string()))?;
        if suffix.is_empty() {
            return Err(TypeError::InvalidDidEvent(s.to_string()));
        }
        Ok(Self {
            address: ContentAddress::parse(address)?,
            suffix: suffix.to_string(),
        })
    }
}

impl fmt::Display for DidEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.suffix)
    }
}
