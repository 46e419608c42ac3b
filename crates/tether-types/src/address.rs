use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of the hex form of an address.
const HEX_LEN: usize = 64;

/// Content-addressed identifier for immutable bytes.
///
/// A `ContentAddress` is the lowercase hex BLAKE3 digest of the content.
/// Identical bytes always produce the same address, so anything fetched from
/// an untrusted source can be checked with [`ContentAddress::verify`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Compute the address of raw bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// Parse an address, rejecting anything that is not 64 hex characters.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != HEX_LEN {
            return Err(TypeError::InvalidAddress {
                value: s.to_string(),
                reason: format!("expected {HEX_LEN} hex characters, got {}", s.len()),
            });
        }
        let mut raw = [0u8; 32];
        hex::decode_to_slice(s, &mut raw).map_err(|e| TypeError::InvalidAddress {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(hex::encode(raw)))
    }

    /// Returns `true` if `data` hashes to this address.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }

    /// The hex string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.short())
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentAddress> for String {
    fn from(addr: ContentAddress) -> Self {
        addr.0
    }
}

impl AsRef<str> for ContentAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn of_is_deterministic() {
        let a = ContentAddress::of(b"hello world");
        let b = ContentAddress::of(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn different_data_produces_different_addresses() {
        assert_ne!(ContentAddress::of(b"hello"), ContentAddress::of(b"world"));
    }

    #[test]
    fn parse_accepts_own_output() {
        let addr = ContentAddress::of(b"test");
        let parsed = ContentAddress::parse(addr.as_str()).unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn parse_normalizes_case() {
        let addr = ContentAddress::of(b"case");
        let upper = addr.as_str().to_uppercase();
        assert_eq!(ContentAddress::parse(&upper).unwrap(), addr);
    }

    #[test]
    fn parse_rejects_short_and_non_hex() {
        assert!(matches!(
            ContentAddress::parse("cid"),
            Err(TypeError::InvalidAddress { .. })
        ));
        let bad = "z".repeat(64);
        assert!(ContentAddress::parse(&bad).is_err());
    }

    #[test]
    fn serde_uses_plain_string() {
        let addr = ContentAddress::of(b"serde");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: ContentAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<ContentAddress>("\"nope\"").is_err());
    }

    #[test]
    fn debug_is_short() {
        let addr = ContentAddress::of(b"dbg");
        assert_eq!(format!("{addr:?}"), format!("ContentAddress({})", addr.short()));
    }

    proptest! {
        #[test]
        fn verify_accepts_only_original_bytes(data in proptest::collection::vec(any::<u8>(), 0..256), flip in any::<u8>()) {
            let addr = ContentAddress::of(&data);
            prop_assert!(addr.verify(&data));
            let mut tampered = data.clone();
            tampered.push(flip);
            prop_assert!(!addr.verify(&tampered));
        }
    }
}
