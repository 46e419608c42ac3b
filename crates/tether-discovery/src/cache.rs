//! Check-then-populate caching with single-flight loads.
//!
//! [`LoadingCache`] is a bounded LRU map whose entries expire a fixed time
//! after insertion. A miss runs the caller's loader; concurrent misses for
//! the same key share one load through [`SingleFlight`]. Failed loads are
//! never cached.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::OnceCell;

/// De-duplicates concurrent work keyed by `K`.
///
/// While a call for a key is in flight, later callers for the same key wait
/// for its result instead of starting their own. Once the call completes the
/// key is forgotten, so the next call runs again.
pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key`, or join a run already in progress.
    ///
    /// If the shared run fails, each waiter retries the work itself; errors
    /// are never handed to callers that did not produce them.
    pub async fn run<F, Fut, E>(&self, key: K, work: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut calls = self.calls.lock().expect("single-flight lock poisoned");
            Arc::clone(calls.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())))
        };

        let result = cell.get_or_try_init(work).await.cloned();

        let mut calls = self.calls.lock().expect("single-flight lock poisoned");
        if calls.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            calls.remove(&key);
        }
        result
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().expect("single-flight lock poisoned").len()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

struct Entry<V> {
    value: V,
    inserted: Instant,
}

/// Bounded, expiring cache populated on demand.
pub struct LoadingCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    loads: SingleFlight<K, V>,
    lifetime: Duration,
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Cache holding at most `capacity` entries (at least one), each valid
    /// for `lifetime` after it was loaded.
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            loads: SingleFlight::new(),
            lifetime,
        }
    }

    /// Cached value for `key`, if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.lifetime => {
                return Some(entry.value.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.put(
            key,
            Entry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().expect("cache lock poisoned").pop(key);
    }

    /// Return the cached value for `key`, loading it with `load` on a miss.
    pub async fn get_or_load<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = self.loads.run(key.clone(), load).await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
