use std::collections::HashMap;
use std::sync::RwLock;

use tether_types::ContentAddress;

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Entries live behind a `RwLock`; an
/// entry is inserted whole, so readers never see partial bytes.
pub struct InMemoryContentStore {
    entries: RwLock<HashMap<ContentAddress, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store bytes under an arbitrary key, bypassing address derivation.
    ///
    /// Only useful for simulating corruption in tests.
    #[doc(hidden)]
    pub fn insert_raw(&self, address: ContentAddress, data: Vec<u8>) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(address, data);
        }
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryContentStore {
    fn get(&self, address: &ContentAddress) -> StoreResult<Option<Vec<u8>>> {
        let map = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(address).cloned())
    }

    fn put(&self, data: &[u8]) -> StoreResult<ContentAddress> {
        let address = ContentAddress::of(data);
        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        map.entry(address.clone()).or_insert_with(|| data.to_vec());
        Ok(address)
    }

    fn contains(&self, address: &ContentAddress) -> StoreResult<bool> {
        let map = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.contains_key(address))
    }

    fn delete(&self, address: &ContentAddress) -> StoreResult<bool> {
        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        Ok(map.remove(address).is_some())
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("entry_count", &self.len())
            .finish()
    }
}
