//! Peer discovery for tether.
//!
//! A peer advertises its service endpoints in a directory document
//! (`/.well-known/host-meta.json`). This crate fetches those documents,
//! caches them with bounded size and fixed expiry, and answers
//! "where does this peer serve links of type X?".
//!
//! It also owns the two remote transports the rest of the node reads
//! through: plain HTTP ([`HttpFetcher`]) and the distributed content
//! network ([`ContentNetwork`]).

pub mod cache;
pub mod error;
pub mod jrd;
pub mod network;
pub mod references;
pub mod resolver;
pub mod transport;

pub use cache::{LoadingCache, SingleFlight};
pub use error::{DiscoveryError, DiscoveryResult};
pub use jrd::{Jrd, Link};
pub use network::{ContentNetwork, ContentNetworkConfig, IpfsHttpClient, StaticContentNetwork};
pub use references::{ReferenceDocument, ReferenceIterator};
pub use resolver::{DirectoryConfig, DirectoryResolver};
pub use transport::{HttpFetcher, ReqwestFetcher, StaticFetcher};
