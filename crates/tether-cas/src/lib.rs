//! Content resolver for tether.
//!
//! Reads are local-first. On a miss the resolver uses the caller's
//! [`DiscoveryHint`](tether_types::DiscoveryHint) to locate a remote copy,
//! verifies that the bytes hash to the requested address, and caches them
//! in the local store before returning.

pub mod error;
pub mod resolver;

pub use error::{CasError, CasResult};
pub use resolver::{ContentResolver, ResolverConfig, Source, CAS_LINK_TYPE};
