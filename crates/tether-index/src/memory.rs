use std::collections::HashMap;
use std::sync::RwLock;

use tether_types::ContentAddress;

use crate::error::IndexResult;
use crate::traits::DidAnchorIndex;

/// In-memory index for tests and single-process nodes.
#[derive(Debug, Default)]
pub struct InMemoryDidAnchorIndex {
    entries: RwLock<HashMap<String, ContentAddress>>,
}

impl InMemoryDidAnchorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DidAnchorIndex for InMemoryDidAnchorIndex {
    fn put_bulk(&self, suffixes: &[String], address: &ContentAddress) -> IndexResult<()> {
        let mut entries = self.entries.write().expect("lock poisoned");
        for suffix in suffixes {
            entries.insert(suffix.clone(), address.clone());
        }
        Ok(())
    }

    fn get(&self, suffix: &str) -> IndexResult<Option<ContentAddress>> {
        Ok(self.entries.read().expect("lock poisoned").get(suffix).cloned())
    }
}
