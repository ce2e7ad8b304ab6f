use loglens_vector_store::{
    CancellationToken, EvictionPolicy, StoreConfig, TfidfVectorizer, VectorStore,
    VectorStoreError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn pseudo_vector(seed: u64, dims: usize) -> Vec<f32> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..dims)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            #[allow(clippy::cast_precision_loss)]
            let unit = (state % 10_000) as f32 / 10_000.0;
            unit * 2.0 - 1.0
        })
        .collect()
}

fn populated(config: StoreConfig, count: u64, dims: usize) -> VectorStore {
    let store = VectorStore::new(config).expect("store");
    for i in 0..count {
        store
            .store(&format!("doc-{i:04}"), "", pseudo_vector(i, dims))
            .expect("store vector");
    }
    store
}

#[test]
fn cache_does_not_change_search_results() {
    for policy in [EvictionPolicy::Fifo, EvictionPolicy::Lru] {
        let cached = populated(
            StoreConfig::default()
                .with_cache_size(64)
                .with_eviction_policy(policy),
            300,
            16,
        );
        let uncached = populated(StoreConfig::default().with_cache(false), 300, 16);

        for q in 0..5 {
            let query = pseudo_vector(10_000 + q, 16);
            // Run twice so the second pass is served partly from the cache.
            let _ = cached.search(&query, 10);
            let with_cache = cached.search(&query, 10);
            let without_cache = uncached.search(&query, 10);

            assert_eq!(with_cache.len(), without_cache.len());
            for (a, b) in with_cache.iter().zip(without_cache.iter()) {
                assert_eq!(a.id, b.id);
                assert!((a.score - b.score).abs() < 1e-6);
            }
        }
        assert!(cached.stats().cache.hits > 0);
    }
}

#[test]
fn search_results_are_sorted_and_bounded() {
    let store = populated(StoreConfig::default(), 25, 8);
    let query = pseudo_vector(999, 8);

    let results = store.search(&query, 10);
    assert_eq!(results.len(), 10);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

    assert_eq!(store.search(&query, 100).len(), 25);
    assert!(store.search(&query, 0).is_empty());
}

#[test]
fn capacity_boundary() {
    let max = 50;
    let store = VectorStore::new(StoreConfig::default().with_max_vectors(max)).unwrap();
    for i in 0..max {
        store.store(&format!("id-{i}"), "", vec![1.0, 0.0]).unwrap();
    }
    assert!(matches!(
        store.store("one-too-many", "", vec![1.0, 0.0]),
        Err(VectorStoreError::CapacityExceeded { .. })
    ));
    store.store("id-0", "replaced", vec![0.0, 1.0]).unwrap();
    assert_eq!(store.len(), max);
}

#[test]
fn concurrent_stores_lose_no_writes() {
    let store = Arc::new(VectorStore::new(StoreConfig::default()).unwrap());
    let writers = 8;
    let per_writer = 125;

    std::thread::scope(|scope| {
        for w in 0..writers {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..per_writer {
                    let seed = (w * per_writer + i) as u64;
                    store
                        .store(&format!("w{w}-{i}"), "", pseudo_vector(seed, 8))
                        .unwrap();
                }
            });
        }
        for r in 0..4 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for _ in 0..50 {
                    let results = store.search(&pseudo_vector(50_000 + r, 8), 5);
                    assert!(results.len() <= 5);
                }
            });
        }
    });

    assert_eq!(store.len(), writers * per_writer);
}

#[test]
fn cancelled_search_returns_no_partial_results() {
    let store = populated(StoreConfig::default().with_cancel_check_interval(10), 500, 8);
    let token = CancellationToken::new();
    token.cancel();

    let result = store.search_with_cancel(&token, &pseudo_vector(1, 8), 5);
    assert!(matches!(result, Err(VectorStoreError::Cancelled)));
}

/// Cancels `token` from inside the scan after `cancel_after` comparisons and
/// returns how many comparisons ran in total.
fn cancel_mid_scan(interval: usize, cancel_after: usize) -> (usize, bool) {
    let store = populated(
        StoreConfig::default().with_cancel_check_interval(interval),
        500,
        8,
    );
    let token = CancellationToken::new();
    let visited = AtomicUsize::new(0);

    let result = store.search_with_filter_and_cancel(&token, &pseudo_vector(1, 8), 5, |_| {
        if visited.fetch_add(1, Ordering::SeqCst) + 1 == cancel_after {
            token.cancel();
        }
        true
    });
    let cancelled = match result {
        Err(VectorStoreError::Cancelled) => true,
        Ok(hits) => {
            assert_eq!(hits.len(), 5);
            false
        }
        Err(other) => panic!("unexpected error: {other}"),
    };
    (visited.load(Ordering::SeqCst), cancelled)
}

#[test]
fn cancellation_mid_scan_stops_at_next_check() {
    let (visited, cancelled) = cancel_mid_scan(10, 50);
    assert!(cancelled);
    assert_eq!(visited, 50);

    let (visited, cancelled) = cancel_mid_scan(100, 50);
    assert!(cancelled);
    assert_eq!(visited, 100);

    // A token cancelled after the last check lets the scan finish.
    let (visited, cancelled) = cancel_mid_scan(1_000, 50);
    assert!(!cancelled);
    assert_eq!(visited, 500);
}

#[test]
fn tfidf_vectors_retrieve_matching_documents() {
    let docs = [
        "postgres connection pool exhausted under load",
        "disk quota exceeded on log volume",
        "tls certificate expired for upstream gateway",
    ];
    let mut vectorizer = TfidfVectorizer::new(32);
    let vectors = vectorizer.fit_transform(&docs).unwrap();

    let store = VectorStore::new(StoreConfig::default()).unwrap();
    for (i, (doc, vector)) in docs.iter().zip(vectors).enumerate() {
        store.store(&format!("doc-{i}"), doc, vector).unwrap();
    }

    let query = vectorizer.vectorize("certificate expired").unwrap();
    let hits = store.search(&query, 1);
    assert_eq!(hits[0].id, "doc-2");
    assert!(hits[0].score > 0.0);
}
