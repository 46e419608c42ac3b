//! Foundation types for tether.
//!
//! Every other tether crate depends on `tether-types`. It holds the data
//! model that travels between components: content addresses, anchor
//! credentials and their payloads, the two event-stream message bodies, and
//! the error classification shared by the whole pipeline.
//!
//! # Key Types
//!
//! - [`ContentAddress`]: BLAKE3-derived identifier for immutable bytes
//! - [`AnchorCredential`] / [`AnchorPayload`]: signed anchor and its subject
//! - [`AnchorInfo`]: the unit carried on the "new anchor" stream
//! - [`DidEvent`]: `<address>:<suffix>` carried on the "DID affected" stream
//! - [`DiscoveryHint`]: where to look when an address is not held locally
//! - [`ErrorClass`] / [`Classify`]: permanent vs retryable failures
//! - [`MetricsSink`]: injected, fire-and-forget timing sink

pub mod address;
pub mod anchor;
pub mod error;
pub mod event;
pub mod hint;
pub mod metrics;

pub use address::ContentAddress;
pub use anchor::{AnchorCredential, AnchorInfo, AnchorPayload};
pub use error::{Classify, ErrorClass, TypeError};
pub use event::DidEvent;
pub use hint::DiscoveryHint;
pub use metrics::{MetricsSink, NoopMetrics};
