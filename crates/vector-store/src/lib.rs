//! # Loglens Vector Store
//!
//! In-memory exact similarity search for documentation retrieval.
//!
//! ## Features
//!
//! - **Exact cosine search** over every stored vector, with optional filtering
//!   and cooperative cancellation
//! - **Bounded similarity cache** with FIFO (default) or LRU eviction
//! - **TF-IDF vectorizer** producing fixed-length vectors from text
//! - **Persistent storage** with JSON serialization and periodic autosave
//! - **Thread-safe** reads and writes behind a store-wide `RwLock`
//!
//! ## Architecture
//!
//! ```text
//! Documents
//!     │
//!     ├──> TfidfVectorizer (fit / vectorize)
//!     │      └─> Vec<f32; dimensions>
//!     │
//!     ├──> VectorStore
//!     │      ├─> cosine similarity (similarity.rs)
//!     │      └─> SimilarityCache (FIFO / LRU)
//!     │
//!     └──> Persistent Storage
//!            └─> JSON file + autosave task
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use loglens_vector_store::{StoreConfig, TfidfVectorizer, VectorStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let docs = ["disk full on /var", "connection pool exhausted"];
//!     let mut vectorizer = TfidfVectorizer::new(64);
//!     let vectors = vectorizer.fit_transform(&docs)?;
//!
//!     let store = VectorStore::new(StoreConfig::default())?;
//!     for (i, (doc, vector)) in docs.iter().zip(vectors).enumerate() {
//!         store.store(&format!("doc-{i}"), doc, vector)?;
//!     }
//!
//!     let query = vectorizer.vectorize("database connection errors")?;
//!     for hit in store.search(&query, 3) {
//!         println!("{}: {:.3}", hit.id, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod persistence;
pub mod similarity;
mod store;
mod tfidf;
mod types;

pub use cache::{query_hash, CacheKey, EvictionPolicy, SimilarityCache, QUERY_HASH_COMPONENTS};
pub use config::{
    StoreConfig, DEFAULT_CACHE_SIZE, DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_MAX_VECTORS,
};
pub use error::{Result, VectorStoreError};
pub use similarity::{
    cosine_similarity, dot_product, euclidean_distance, magnitude, magnitude_squared,
    normalize_vector,
};
pub use store::VectorStore;
pub use tfidf::{TfidfVectorizer, DEFAULT_MAX_WORD_LENGTH, DEFAULT_MIN_WORD_LENGTH};
pub use types::{CacheStats, Metadata, SearchResult, StoreStats, VectorEntry};

// Re-exported so callers can build cancellation tokens without a direct dependency.
pub use tokio_util::sync::CancellationToken;
