//! Local content-addressed storage for tether.
//!
//! Every anchor credential and every remote object this node has verified
//! is kept here, keyed by its [`ContentAddress`](tether_types::ContentAddress).
//!
//! # Design Rules
//!
//! 1. Entries are immutable once written; the address is derived from the bytes.
//! 2. `put` is idempotent.
//! 3. Readers never observe a partially written entry.
//! 4. The store never interprets the bytes it holds.
//! 5. All I/O errors are propagated.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsContentStore;
pub use memory::InMemoryContentStore;
pub use traits::ContentStore;
