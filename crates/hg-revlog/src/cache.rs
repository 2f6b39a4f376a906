//! LRU cache for reconstructed revision content.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

/// LRU cache mapping revision numbers to reconstructed content.
///
/// Values are `Arc`-shared so a hit hands out the cached buffer without
/// copying it, and the cache stays valid while callers hold clones.
pub struct ContentCache {
    cache: LruCache<u32, Arc<Vec<u8>>>,
}

impl ContentCache {
    /// Create with the given capacity (number of revisions).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get cached content (promotes it to most-recently-used).
    pub fn get(&mut self, rev: u32) -> Option<Arc<Vec<u8>>> {
        self.cache.get(&rev).cloned()
    }

    /// Insert reconstructed content for a revision.
    pub fn insert(&mut self, rev: u32, content: Arc<Vec<u8>>) {
        self.cache.push(rev, content);
    }

    /// Check if a revision is cached (without promoting).
    pub fn contains(&self, rev: u32) -> bool {
        self.cache.contains(&rev)
    }

    /// Drop all cached content.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Current number of cached revisions.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
