use crate::cache::{CacheKey, SimilarityCache};
use crate::config::StoreConfig;
use crate::error::{Result, VectorStoreError};
use crate::persistence::AutosaveTask;
use crate::similarity::{cosine_similarity, normalize_vector};
use crate::types::{unix_ms_now, Metadata, SearchResult, StoreStats, VectorEntry};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

/// Exact-search, in-memory vector store.
///
/// Content sits behind one store-wide `RwLock`; the similarity cache has its
/// own lock so cached lookups do not contend with structural reads. Lock order
/// is always content first, cache second.
pub struct VectorStore {
    pub(crate) config: StoreConfig,
    pub(crate) entries: RwLock<HashMap<String, VectorEntry>>,
    pub(crate) cache: Option<SimilarityCache>,
    pub(crate) autosave: Mutex<Option<AutosaveTask>>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("vectors", &self.len())
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

impl VectorStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let cache = config
            .enable_cache
            .then(|| SimilarityCache::new(config.cache_size, config.eviction_policy));
        Ok(Self {
            config,
            entries: RwLock::new(HashMap::new()),
            cache,
            autosave: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, VectorEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, VectorEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn invalidate_cached(&self, id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_target(id);
        }
    }

    pub(crate) fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Validates and normalizes an entry read from a file under key `id`.
    ///
    /// The map key wins over the entry's own `id` field. The timestamp is kept.
    pub(crate) fn adopt_loaded(&self, id: String, mut entry: VectorEntry) -> Result<VectorEntry> {
        if entry.id != id {
            log::warn!("Entry under key '{id}' carries id '{}'; using the key", entry.id);
            entry.id = id;
        }
        check_finite(&entry.id, &entry.vector)?;
        entry.vector = self.prepare(std::mem::take(&mut entry.vector));
        Ok(entry)
    }

    fn prepare(&self, vector: Vec<f32>) -> Vec<f32> {
        if self.config.normalize_vectors {
            normalize_vector(&vector)
        } else {
            vector
        }
    }

    fn insert_locked(
        &self,
        entries: &mut HashMap<String, VectorEntry>,
        mut entry: VectorEntry,
    ) -> Result<()> {
        check_finite(&entry.id, &entry.vector)?;
        let exists = entries.contains_key(&entry.id);
        if !exists && entries.len() >= self.config.max_vectors {
            log::warn!(
                "Rejecting vector '{}': store is at capacity ({})",
                entry.id,
                self.config.max_vectors
            );
            return Err(VectorStoreError::CapacityExceeded {
                max: self.config.max_vectors,
            });
        }

        entry.vector = self.prepare(std::mem::take(&mut entry.vector));
        entry.timestamp = unix_ms_now();
        if exists {
            self.invalidate_cached(&entry.id);
        }
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Inserts or replaces the vector stored under `id`.
    ///
    /// New ids are rejected once `max_vectors` is reached; overwrites always succeed.
    pub fn store(&self, id: &str, text: &str, vector: Vec<f32>) -> Result<()> {
        self.store_with_metadata(id, text, vector, Metadata::new())
    }

    pub fn store_with_metadata(
        &self,
        id: &str,
        text: &str,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<()> {
        let mut entry = VectorEntry::new(id, text, vector);
        entry.metadata = metadata;
        let mut entries = self.write_entries();
        self.insert_locked(&mut entries, entry)
    }

    /// Stores entries in order under a single write lock.
    ///
    /// Stops at the first failure; entries stored before it remain.
    pub fn store_batch(&self, batch: Vec<VectorEntry>) -> Result<usize> {
        let mut entries = self.write_entries();
        let mut stored = 0;
        for entry in batch {
            self.insert_locked(&mut entries, entry)?;
            stored += 1;
        }
        log::debug!("Stored batch of {stored} vectors. Total: {}", entries.len());
        Ok(stored)
    }

    /// Top `top_k` entries by cosine similarity, best first.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchResult> {
        self.rank(query, top_k, None, None).unwrap_or_default()
    }

    /// Like [`search`](Self::search) but aborts with
    /// [`VectorStoreError::Cancelled`] once `cancel` fires.
    ///
    /// The token is checked every `cancel_check_interval` comparisons, starting
    /// before the first one.
    pub fn search_with_cancel(
        &self,
        cancel: &CancellationToken,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.rank(query, top_k, None, Some(cancel))
    }

    /// Like [`search`](Self::search) but only scores entries accepted by `predicate`.
    pub fn search_with_filter<F>(&self, query: &[f32], top_k: usize, predicate: F) -> Vec<SearchResult>
    where
        F: Fn(&VectorEntry) -> bool,
    {
        let predicate: &dyn Fn(&VectorEntry) -> bool = &predicate;
        self.rank(query, top_k, Some(predicate), None)
            .unwrap_or_default()
    }

    /// Filtered search that also honours `cancel`.
    pub fn search_with_filter_and_cancel<F>(
        &self,
        cancel: &CancellationToken,
        query: &[f32],
        top_k: usize,
        predicate: F,
    ) -> Result<Vec<SearchResult>>
    where
        F: Fn(&VectorEntry) -> bool,
    {
        let predicate: &dyn Fn(&VectorEntry) -> bool = &predicate;
        self.rank(query, top_k, Some(predicate), Some(cancel))
    }

    fn rank(
        &self,
        query: &[f32],
        top_k: usize,
        predicate: Option<&dyn Fn(&VectorEntry) -> bool>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<SearchResult>> {
        let query = if self.config.normalize_vectors {
            normalize_vector(query)
        } else {
            query.to_vec()
        };
        let interval = self.config.cancel_check_interval.max(1);

        let entries = self.read_entries();
        let mut scored: Vec<(f32, &VectorEntry)> = Vec::with_capacity(entries.len());
        for (i, entry) in entries.values().enumerate() {
            if i % interval == 0 && cancel.is_some_and(CancellationToken::is_cancelled) {
                log::debug!("Search cancelled after {i} comparisons");
                return Err(VectorStoreError::Cancelled);
            }
            if predicate.is_some_and(|accept| !accept(entry)) {
                continue;
            }
            scored.push((self.score(&query, entry), entry));
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| SearchResult::from_entry(entry, score))
            .collect())
    }

    fn score(&self, query: &[f32], entry: &VectorEntry) -> f32 {
        let Some(cache) = &self.cache else {
            return cosine_similarity(query, &entry.vector);
        };
        let key = CacheKey::new(query, &entry.id);
        if let Some(score) = cache.get(&key) {
            return score;
        }
        let score = cosine_similarity(query, &entry.vector);
        cache.insert(key, score);
        score
    }

    pub fn get(&self, id: &str) -> Result<VectorEntry> {
        self.read_entries()
            .get(id)
            .cloned()
            .ok_or_else(|| VectorStoreError::NotFound(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let mut entries = self.write_entries();
        if entries.remove(id).is_none() {
            return Err(VectorStoreError::NotFound(id.to_string()));
        }
        self.invalidate_cached(id);
        Ok(())
    }

    /// Replaces the metadata of `id` wholesale.
    pub fn update_metadata(&self, id: &str, metadata: Metadata) -> Result<()> {
        let mut entries = self.write_entries();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| VectorStoreError::NotFound(id.to_string()))?;
        entry.metadata = metadata;
        entry.timestamp = unix_ms_now();
        Ok(())
    }

    /// All ids in sorted order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_entries().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.write_entries();
        entries.clear();
        self.clear_cache();
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            vectors: self.len(),
            max_vectors: self.config.max_vectors,
            cache_enabled: self.cache.is_some(),
            cache: self
                .cache
                .as_ref()
                .map(SimilarityCache::stats)
                .unwrap_or_default(),
        }
    }
}

/// NaN and infinite components cannot be persisted as JSON numbers.
fn check_finite(id: &str, vector: &[f32]) -> Result<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(VectorStoreError::InvalidVector(format!(
            "'{id}' has a non-finite component at index {index}"
        ))),
        None => Ok(()),
    }
}
