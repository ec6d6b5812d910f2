//! Prepared batch cache
//!
//! Keeps finalized batches in memory until they are fetched, deleted, expire
//! or get pushed out by the memory and count limits (least recently used
//! first).

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::CacheConfig;
use crate::state::PreparedBatch;

/// Cache entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub batch: Arc<PreparedBatch>,
    pub created_at: SystemTime,
    pub last_accessed: SystemTime,
    pub access_count: usize,
}

impl CacheEntry {
    pub fn new(batch: Arc<PreparedBatch>) -> Self {
        let now = SystemTime::now();
        Self {
            batch,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = SystemTime::now();
        self.access_count += 1;
    }

    pub fn age_secs(&self) -> u64 {
        self.created_at.elapsed().map(|d| d.as_secs()).unwrap_or(0)
    }

    pub fn is_expired(&self, ttl_secs: u64) -> bool {
        self.created_at
            .elapsed()
            .map(|age| age > Duration::from_secs(ttl_secs))
            .unwrap_or(false)
    }

    pub fn size(&self) -> usize {
        self.batch.size_bytes()
    }
}

/// In-memory store of prepared batches keyed by batch id
pub struct BatchCache {
    /// Cache entries (batch_id -> entry)
    entries: DashMap<String, CacheEntry>,
    /// Current PCM bytes held
    memory_bytes: AtomicUsize,
    /// Cache configuration
    config: CacheConfig,
}

impl BatchCache {
    /// Create a new batch cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            memory_bytes: AtomicUsize::new(0),
            config,
        }
    }

    /// Get a batch and mark it as used
    pub fn get(&self, batch_id: &str) -> Option<Arc<PreparedBatch>> {
        let mut entry = self.entries.get_mut(batch_id)?;
        if entry.is_expired(self.config.ttl_secs) {
            return None;
        }
        entry.touch();
        Some(Arc::clone(&entry.batch))
    }

    pub fn contains(&self, batch_id: &str) -> bool {
        self.entries.contains_key(batch_id)
    }

    /// Store a batch. Returns the number of batches evicted to make room.
    pub fn insert(&self, batch: Arc<PreparedBatch>) -> usize {
        let size = batch.size_bytes();
        let evicted = self.evict_for(size);

        if size > self.config.max_memory_bytes() {
            tracing::warn!(
                batch_id = %batch.id,
                size,
                limit = self.config.max_memory_bytes(),
                "batch exceeds cache memory limit"
            );
        }

        let id = batch.id.clone();
        if let Some(old) = self.entries.insert(id, CacheEntry::new(batch)) {
            self.memory_bytes.fetch_sub(old.size(), Ordering::Relaxed);
        }
        self.memory_bytes.fetch_add(size, Ordering::Relaxed);
        evicted
    }

    /// Evict entries until `needed_size` more bytes and one more batch fit
    fn evict_for(&self, needed_size: usize) -> usize {
        let mut evicted = self.clear_expired();

        let fits = |cache: &Self| {
            cache.memory_usage() + needed_size <= cache.config.max_memory_bytes()
                && cache.entries.len() < cache.config.max_batches.max(1)
        };
        if fits(self) {
            return evicted;
        }

        // Oldest access first
        let mut candidates: Vec<(String, SystemTime)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().last_accessed))
            .collect();
        candidates.sort_by_key(|(_, accessed)| *accessed);

        for (key, _) in candidates {
            if fits(self) {
                break;
            }
            if self.remove(&key).is_some() {
                tracing::debug!(batch_id = %key, "evicted batch");
                evicted += 1;
            }
        }
        evicted
    }

    /// Remove a batch
    pub fn remove(&self, batch_id: &str) -> Option<Arc<PreparedBatch>> {
        let (_, entry) = self.entries.remove(batch_id)?;
        self.memory_bytes.fetch_sub(entry.size(), Ordering::Relaxed);
        Some(entry.batch)
    }

    /// Clear all expired entries. Returns the number removed.
    pub fn clear_expired(&self) -> usize {
        let mut freed = 0;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired(self.config.ttl_secs) {
                freed += entry.size();
                removed += 1;
                false
            } else {
                true
            }
        });
        self.memory_bytes.fetch_sub(freed, Ordering::Relaxed);
        removed
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut count = 0;
        let mut total_size = 0;
        let mut oldest_age = 0;
        let mut total_accesses = 0;

        for entry in self.entries.iter() {
            count += 1;
            total_size += entry.value().size();
            oldest_age = oldest_age.max(entry.value().age_secs());
            total_accesses += entry.value().access_count;
        }

        CacheStats {
            entry_count: count,
            total_size_bytes: total_size,
            memory_limit_bytes: self.config.max_memory_bytes(),
            max_batches: self.config.max_batches,
            ttl_secs: self.config.ttl_secs,
            oldest_entry_age_secs: oldest_age,
            total_accesses,
        }
    }

    /// Get the number of cached batches
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get current memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.memory_bytes.load(Ordering::Relaxed)
    }
}

/// Cache statistics
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_size_bytes: usize,
    pub memory_limit_bytes: usize,
    pub max_batches: usize,
    pub ttl_secs: u64,
    pub oldest_entry_age_secs: u64,
    pub total_accesses: usize,
}

impl Default for BatchCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::batch_with_samples;

    #[test]
    fn test_cache_insert_get() {
        let cache = BatchCache::default();
        let batch = batch_with_samples(&[1, 2, 3, 4]);
        let id = batch.id.clone();

        cache.insert(batch);

        assert!(cache.contains(&id));
        assert_eq!(cache.get(&id).map(|b| b.id.clone()), Some(id));
        assert_eq!(cache.memory_usage(), 8);
    }

    #[test]
    fn test_cache_miss() {
        let cache = BatchCache::default();
        assert!(!cache.contains("nope"));
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_cache_remove_frees_memory() {
        let cache = BatchCache::default();
        let batch = batch_with_samples(&[0; 8]);
        let id = batch.id.clone();
        cache.insert(batch);

        assert!(cache.remove(&id).is_some());
        assert!(cache.remove(&id).is_none());
        assert_eq!(cache.memory_usage(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_count_limit_evicts_least_recently_used() {
        let cache = BatchCache::new(CacheConfig {
            max_batches: 2,
            ..Default::default()
        });
        let a = batch_with_samples(&[0; 4]);
        let b = batch_with_samples(&[0; 4]);
        let c = batch_with_samples(&[0; 4]);
        let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());

        cache.insert(a);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(b);
        std::thread::sleep(Duration::from_millis(5));
        cache.get(&a_id);

        assert_eq!(cache.insert(c), 1);
        assert!(cache.contains(&a_id));
        assert!(!cache.contains(&b_id));
        assert!(cache.contains(&c_id));
        assert_eq!(cache.memory_usage(), 16);
    }

    #[test]
    fn test_expired_entries_are_cleared() {
        let cache = BatchCache::new(CacheConfig {
            ttl_secs: 0,
            ..Default::default()
        });
        let batch = batch_with_samples(&[0; 2]);
        let id = batch.id.clone();
        cache.insert(batch);
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get(&id).is_none());
        assert_eq!(cache.clear_expired(), 1);
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_cache_stats() {
        let cache = BatchCache::default();
        let batch = batch_with_samples(&[0; 6]);
        let id = batch.id.clone();
        cache.insert(batch);
        cache.get(&id);
        cache.get(&id);

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_accesses, 2);
        assert_eq!(stats.total_size_bytes, 12);
        assert_eq!(stats.max_batches, 32);
    }
}
