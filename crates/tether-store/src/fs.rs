//! Filesystem-backed content store.
//!
//! Layout mirrors a loose-object directory: the first two hex characters of
//! an address pick a fan-out directory, the remaining 62 name the file.
//!
//! ```text
//! <root>/ab/cdef0123...   (bytes of the entry whose address is abcdef0123...)
//! ```
//!
//! Writes go to a temporary file in the same fan-out directory and are then
//! renamed into place, which is atomic on the same filesystem.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use tether_types::ContentAddress;

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// Durable content store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, address: &ContentAddress) -> PathBuf {
        let hex = address.as_str();
        self.root.join(&hex[..2]).join(&hex[2..])
    }
}

impl ContentStore for FsContentStore {
    fn get(&self, address: &ContentAddress) -> StoreResult<Option<Vec<u8>>> {
        let data = match fs::read(self.path_for(address)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let computed = ContentAddress::of(&data);
        if computed != *address {
            warn!(address = %address, computed = %computed, "stored entry failed verification");
            return Err(StoreError::HashMismatch {
                address: address.clone(),
                computed,
            });
        }
        Ok(Some(data))
    }

    fn put(&self, data: &[u8]) -> StoreResult<ContentAddress> {
        let address = ContentAddress::of(data);
        let path = self.path_for(&address);
        if path.exists() {
            return Ok(address);
        }

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        // A concurrent writer may win the rename; the content is identical.
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(address = %address.short(), len = data.len(), "stored content");
        Ok(address)
    }

    fn contains(&self, address: &ContentAddress) -> StoreResult<bool> {
        Ok(self.path_for(address).is_file())
    }

    fn delete(&self, address: &ContentAddress) -> StoreResult<bool> {
        match fs::remove_file(self.path_for(address)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn put_get_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let addr = store.put(b"anchor bytes").unwrap();

        let hex = addr.as_str();
        assert!(dir.path().join(&hex[..2]).join(&hex[2..]).is_file());
        assert_eq!(store.get(&addr).unwrap().unwrap(), b"anchor bytes");
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let addr = FsContentStore::open(dir.path()).unwrap().put(b"durable").unwrap();
        let reopened = FsContentStore::open(dir.path()).unwrap();
        assert!(reopened.contains(&addr).unwrap());
        assert_eq!(reopened.get(&addr).unwrap().unwrap(), b"durable");
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        assert!(store.get(&ContentAddress::of(b"nope")).unwrap().is_none());
        assert!(!store.delete(&ContentAddress::of(b"nope")).unwrap());
    }

    #[test]
    fn corrupted_entry_is_integrity_violation() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let addr = store.put(b"original").unwrap();
        fs::write(store.path_for(&addr), b"tampered").unwrap();

        let err = store.get(&addr).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
        use tether_types::{Classify, ErrorClass};
        assert_eq!(err.class(), ErrorClass::IntegrityViolation);
    }

    #[test]
    fn concurrent_writers_of_same_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsContentStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.put(b"contended").unwrap())
            })
            .collect();

        let addrs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.get(&addrs[0]).unwrap().unwrap(), b"contended");
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let addr = store.put(b"bye").unwrap();
        assert!(store.delete(&addr).unwrap());
        assert!(!store.contains(&addr).unwrap());
    }
}
