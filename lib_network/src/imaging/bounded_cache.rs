//! Least-recently-used cache bounded by entry count and by total cost.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Default entry ceiling.
pub const DEFAULT_COUNT_LIMIT: usize = 100;
/// Default cost ceiling: 50 MB.
pub const DEFAULT_COST_LIMIT: usize = 50 * 1024 * 1024;

/// An LRU cache that also tracks the summed cost of its entries.
///
/// Inserting past either ceiling evicts least-recently-used entries. An
/// entry whose own cost exceeds the cost ceiling is never stored.
#[derive(Debug)]
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: LruCache<K, (V, usize)>,
    total_cost: usize,
    cost_limit: usize,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    pub fn new(count_limit: NonZeroUsize, cost_limit: usize) -> Self {
        Self {
            entries: LruCache::new(count_limit),
            total_cost: 0,
            cost_limit,
        }
    }

    /// Looks up `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(value, _)| value)
    }

    /// Stores `value` under `key`. Returns false when the entry was too
    /// costly to keep.
    pub fn insert(&mut self, key: K, value: V, cost: usize) -> bool {
        if cost > self.cost_limit {
            // Keep the old entry out too; it is stale for this key.
            self.remove(&key);
            return false;
        }

        if let Some((_, (_, evicted_cost))) = self.entries.push(key, (value, cost)) {
            // Either the replaced value for this key or the LRU entry.
            self.total_cost -= evicted_cost;
        }
        self.total_cost += cost;

        while self.total_cost > self.cost_limit {
            match self.entries.pop_lru() {
                Some((_, (_, evicted_cost))) => self.total_cost -= evicted_cost,
                None => break,
            }
        }
        true
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (value, cost) = self.entries.pop(key)?;
        self.total_cost -= cost;
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0;
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }
}

impl<K: Hash + Eq, V> Default for BoundedCache<K, V> {
    fn default() -> Self {
        // DEFAULT_COUNT_LIMIT is non-zero.
        let count_limit = NonZeroUsize::new(DEFAULT_COUNT_LIMIT).unwrap_or(NonZeroUsize::MIN);
        Self::new(count_limit, DEFAULT_COST_LIMIT)
    }
}
