//! Anchor graph for tether.
//!
//! Anchor credentials form a DAG through their `previousAnchors` links: for
//! every identifier suffix an anchor touches, it names the anchor that last
//! touched that suffix. The graph never stores edges itself; it follows
//! links through the [`ContentResolver`](tether_cas::ContentResolver).
//!
//! # Invariants
//!
//! - Histories are returned oldest-first and end at the requested anchor.
//! - A walk never exceeds the configured depth bound.
//! - A link that cannot be resolved mid-walk is reported as retryable.

pub mod error;
pub mod graph;

pub use error::{GraphError, GraphResult};
pub use graph::{AnchorGraph, AnchorNode, DidHistory, DEFAULT_MAX_DEPTH};
