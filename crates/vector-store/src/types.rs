use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub type Metadata = HashMap<String, String>;

/// A stored vector together with its source text and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Insertion or last-write time, unix milliseconds.
    pub timestamp: u64,
}

impl VectorEntry {
    pub fn new(id: impl Into<String>, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            vector,
            metadata: Metadata::new(),
            timestamp: unix_ms_now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

impl SearchResult {
    pub(crate) fn from_entry(entry: &VectorEntry, score: f32) -> Self {
        Self {
            id: entry.id.clone(),
            score,
            text: entry.text.clone(),
            vector: entry.vector.clone(),
            metadata: entry.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Age of the oldest cached score, if any.
    pub oldest_entry_age_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub vectors: usize,
    pub max_vectors: usize,
    pub cache_enabled: bool,
    pub cache: CacheStats,
}

pub(crate) fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
