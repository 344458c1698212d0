//! Bounded least-recently-used cache for explorer lookups.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

/// Default number of entries kept per cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Fixed-capacity map that evicts the least recently used entry on overflow.
///
/// Recency is tracked in a queue (oldest first); capacities are small, so the
/// linear reorder on hit is fine.
pub struct BoundedCache<K, V> {
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.entries.get(key)
    }

    /// Insert or replace. Returns the evicted key, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }
        if self.entries.insert(key.clone(), value).is_some() {
            self.touch(&key);
            return None;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            let oldest = self.order.pop_front()?;
            self.entries.remove(&oldest);
            return Some(oldest);
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

/// Outcome of [`MemoCache::get_or_try_init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memoized<V> {
    pub value: V,
    /// `false` when this caller ran the initializer.
    pub hit: bool,
}

/// Single-flight memo over a [`BoundedCache`].
///
/// Each key owns a `OnceCell`; concurrent callers for the same key await the
/// first caller's initializer instead of running their own. A failed
/// initializer leaves the cell empty, so errors are never memoized.
pub struct MemoCache<K, V> {
    slots: Mutex<BoundedCache<K, Arc<OnceCell<V>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> MemoCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, key: K, init: F) -> Result<Memoized<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut slots = self.slots.lock().unwrap();
            match slots.get(&key) {
                Some(cell) => cell.clone(),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    slots.insert(key, cell.clone());
                    cell
                }
            }
        };

        let mut ran = false;
        let value = cell
            .get_or_try_init(|| {
                ran = true;
                init()
            })
            .await?
            .clone();
        Ok(Memoized { value, hit: !ran })
    }

    /// Number of keys with a stored value.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
