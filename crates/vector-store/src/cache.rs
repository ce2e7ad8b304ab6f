//! Bounded memo of `(query, target) -> similarity` scores.
//!
//! The cache never changes search results, only their latency. Two eviction
//! policies are supported:
//!
//! - [`EvictionPolicy::Fifo`] evicts the oldest *inserted* key; cache hits do
//!   not refresh a key's position.
//! - [`EvictionPolicy::Lru`] evicts the least recently *used* key.
//!
//! Keys hash only the first [`QUERY_HASH_COMPONENTS`] query components, so two
//! queries sharing that prefix share cache slots for the same target.

use crate::types::CacheStats;
use lru::LruCache;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

pub const QUERY_HASH_COMPONENTS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    #[default]
    Fifo,
    Lru,
}

impl EvictionPolicy {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fifo" => Some(Self::Fifo),
            "lru" => Some(Self::Lru),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Lru => "lru",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query_hash: u64,
    pub target_id: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(query: &[f32], target_id: &str) -> Self {
        Self {
            query_hash: query_hash(query),
            target_id: target_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CacheEntry {
    score: f32,
    computed_at: Instant,
}

/// FNV-1a over the bit patterns of at most the first 8 components.
#[must_use]
pub fn query_hash(query: &[f32]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for value in query.iter().take(QUERY_HASH_COMPONENTS) {
        for byte in value.to_bits().to_le_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

enum Slots {
    Fifo {
        entries: HashMap<CacheKey, CacheEntry>,
        order: VecDeque<CacheKey>,
    },
    Lru(LruCache<CacheKey, CacheEntry>),
}

impl Slots {
    fn len(&self) -> usize {
        match self {
            Self::Fifo { entries, .. } => entries.len(),
            Self::Lru(lru) => lru.len(),
        }
    }

    fn oldest(&self) -> Option<Instant> {
        match self {
            Self::Fifo { entries, .. } => entries.values().map(|e| e.computed_at).min(),
            Self::Lru(lru) => lru.iter().map(|(_, e)| e.computed_at).min(),
        }
    }
}

pub struct SimilarityCache {
    policy: EvictionPolicy,
    capacity: usize,
    slots: RwLock<Slots>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl std::fmt::Debug for SimilarityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityCache")
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl SimilarityCache {
    #[must_use]
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            policy,
            capacity,
            slots: RwLock::new(Self::empty_slots(capacity, policy)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn empty_slots(capacity: usize, policy: EvictionPolicy) -> Slots {
        match policy {
            EvictionPolicy::Fifo => Slots::Fifo {
                entries: HashMap::with_capacity(capacity.min(4096)),
                order: VecDeque::with_capacity(capacity.min(4096)),
            },
            EvictionPolicy::Lru => {
                Slots::Lru(LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)))
            }
        }
    }

    #[must_use]
    pub const fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &CacheKey) -> Option<f32> {
        let found = match self.policy {
            EvictionPolicy::Fifo => {
                let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
                match &*slots {
                    Slots::Fifo { entries, .. } => entries.get(key).map(|e| e.score),
                    Slots::Lru(lru) => lru.peek(key).map(|e| e.score),
                }
            }
            EvictionPolicy::Lru => {
                // LRU lookups reorder recency, so they need the write side.
                let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
                match &mut *slots {
                    Slots::Fifo { entries, .. } => entries.get(key).map(|e| e.score),
                    Slots::Lru(lru) => lru.get(key).map(|e| e.score),
                }
            }
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: CacheKey, score: f32) {
        let entry = CacheEntry {
            score,
            computed_at: Instant::now(),
        };
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match &mut *slots {
            Slots::Fifo { entries, order } => {
                if let Some(existing) = entries.get_mut(&key) {
                    // Overwrites keep their original insertion slot.
                    *existing = entry;
                    return;
                }
                while entries.len() >= self.capacity {
                    let Some(victim) = order.pop_front() else {
                        break;
                    };
                    if entries.remove(&victim).is_some() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                order.push_back(key.clone());
                entries.insert(key, entry);
            }
            Slots::Lru(lru) => {
                if let Some((evicted, _)) = lru.push(key.clone(), entry) {
                    if evicted != key {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    /// Drops every cached score computed against `target_id`.
    pub fn invalidate_target(&self, target_id: &str) -> usize {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match &mut *slots {
            Slots::Fifo { entries, order } => {
                let before = entries.len();
                entries.retain(|k, _| k.target_id != target_id);
                order.retain(|k| k.target_id != target_id);
                before - entries.len()
            }
            Slots::Lru(lru) => {
                let stale: Vec<CacheKey> = lru
                    .iter()
                    .filter(|(k, _)| k.target_id == target_id)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in &stale {
                    lru.pop(key);
                }
                stale.len()
            }
        }
    }

    pub fn clear(&self) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        *slots = Self::empty_slots(self.capacity, self.policy);
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let oldest_entry_age_ms = slots.oldest().map(|at| {
            u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX)
        });
        CacheStats {
            entries: slots.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            oldest_entry_age_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(q: f32, target: &str) -> CacheKey {
        CacheKey::new(&[q], target)
    }

    #[test]
    fn fifo_evicts_oldest_inserted_even_after_hits() {
        let cache = SimilarityCache::new(2, EvictionPolicy::Fifo);
        cache.insert(key(1.0, "a"), 0.1);
        cache.insert(key(2.0, "b"), 0.2);

        // Hitting "a" must not protect it under FIFO.
        assert_eq!(cache.get(&key(1.0, "a")), Some(0.1));

        cache.insert(key(3.0, "c"), 0.3);
        assert_eq!(cache.get(&key(1.0, "a")), None, "expected a to be evicted");
        assert_eq!(cache.get(&key(2.0, "b")), Some(0.2));
        assert_eq!(cache.get(&key(3.0, "c")), Some(0.3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn lru_keeps_recently_used_entries() {
        let cache = SimilarityCache::new(2, EvictionPolicy::Lru);
        cache.insert(key(1.0, "a"), 0.1);
        cache.insert(key(2.0, "b"), 0.2);

        // Touch "a" so "b" becomes least recently used.
        assert_eq!(cache.get(&key(1.0, "a")), Some(0.1));

        cache.insert(key(3.0, "c"), 0.3);
        assert_eq!(cache.get(&key(2.0, "b")), None, "expected b to be evicted");
        assert_eq!(cache.get(&key(1.0, "a")), Some(0.1));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn query_hash_only_covers_first_eight_components() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, -9.0];
        let c = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.5, 9.0];
        assert_eq!(CacheKey::new(&a, "doc"), CacheKey::new(&b, "doc"));
        assert_ne!(CacheKey::new(&a, "doc"), CacheKey::new(&c, "doc"));
        assert_ne!(CacheKey::new(&a, "doc"), CacheKey::new(&a, "other"));
    }

    #[test]
    fn invalidate_target_removes_only_matching_keys() {
        for policy in [EvictionPolicy::Fifo, EvictionPolicy::Lru] {
            let cache = SimilarityCache::new(8, policy);
            cache.insert(key(1.0, "a"), 0.1);
            cache.insert(key(2.0, "a"), 0.2);
            cache.insert(key(1.0, "b"), 0.3);

            assert_eq!(cache.invalidate_target("a"), 2);
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.get(&key(1.0, "b")), Some(0.3));
        }
    }

    #[test]
    fn overwrite_does_not_grow_or_evict() {
        let cache = SimilarityCache::new(2, EvictionPolicy::Fifo);
        cache.insert(key(1.0, "a"), 0.1);
        cache.insert(key(2.0, "b"), 0.2);
        cache.insert(key(1.0, "a"), 0.5);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(1.0, "a")), Some(0.5));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = SimilarityCache::new(4, EvictionPolicy::Fifo);
        assert_eq!(cache.get(&key(1.0, "a")), None);
        cache.insert(key(1.0, "a"), 0.9);
        assert_eq!(cache.get(&key(1.0, "a")), Some(0.9));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn stats_report_oldest_entry_age() {
        for policy in [EvictionPolicy::Fifo, EvictionPolicy::Lru] {
            let cache = SimilarityCache::new(4, policy);
            assert_eq!(cache.stats().oldest_entry_age_ms, None);

            cache.insert(key(1.0, "a"), 0.5);
            std::thread::sleep(std::time::Duration::from_millis(20));
            cache.insert(key(1.0, "b"), 0.6);
            let age = cache.stats().oldest_entry_age_ms.unwrap();
            assert!(age >= 20, "age {age} should cover the first insert");

            cache.clear();
            assert_eq!(cache.stats().oldest_entry_age_ms, None);
        }
    }
}
