//! DID-anchor index for tether.
//!
//! Records, for every identifier suffix, the content address of the latest
//! anchor that has been applied for it. The index is the only state shared
//! between the observer's workers, so every backend applies a bulk write
//! as one unit.

pub mod error;
pub mod log;
pub mod memory;
pub mod traits;

pub use error::{IndexError, IndexResult};
pub use log::{LogConfig, LogDidAnchorIndex};
pub use memory::InMemoryDidAnchorIndex;
pub use traits::DidAnchorIndex;
