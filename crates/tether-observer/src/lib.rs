//! Anchor observer for tether.
//!
//! The [`Observer`] consumes two event streams. The anchor stream carries
//! references to newly published anchor credentials; the DID stream carries
//! `<contentAddress>:<suffix>` events naming one identifier's latest anchor.
//! For each event the observer works out which anchors have not been applied
//! yet, applies them oldest first through the namespace's
//! [`TransactionProcessor`], and records progress in the DID-anchor index.
//!
//! # Acknowledgement
//!
//! Errors are classified with [`Classify`](tether_types::Classify).
//! Transient failures nack the message so the stream redelivers it; every
//! other failure acks it, since retrying cannot succeed.

pub mod config;
pub mod error;
pub mod observer;
pub mod plan;
pub mod protocol;
pub mod publisher;

pub use config::ObserverConfig;
pub use error::{ObserverError, ObserverResult};
pub use observer::{Observer, Providers};
pub use plan::{merge_histories, PlannedAnchor};
pub use protocol::{
    AnchorTxn, ProcessError, ProtocolClient, ProtocolClientProvider, ProtocolVersion,
    StaticProtocolClientProvider, StaticProtocolVersion, TransactionProcessor,
    VersionedProtocolClient,
};
pub use publisher::Publisher;
