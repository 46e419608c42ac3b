use tether_types::ContentAddress;

use crate::error::StoreResult;

/// Durable content-address -> bytes mapping.
///
/// All implementations must satisfy these invariants:
/// - The address returned by `put` is `ContentAddress::of(data)`.
/// - Writing the same bytes twice is a no-op.
/// - Concurrent readers see either nothing or the complete entry.
pub trait ContentStore: Send + Sync {
    /// Read the bytes stored under `address`.
    ///
    /// Returns `Ok(None)` if nothing is stored there.
    fn get(&self, address: &ContentAddress) -> StoreResult<Option<Vec<u8>>>;

    /// Store `data` and return its address.
    fn put(&self, data: &[u8]) -> StoreResult<ContentAddress>;

    /// Check whether an entry exists.
    fn contains(&self, address: &ContentAddress) -> StoreResult<bool>;

    /// Remove an entry. Returns `true` if it existed.
    ///
    /// Intended for garbage collection only.
    fn delete(&self, address: &ContentAddress) -> StoreResult<bool>;
}
