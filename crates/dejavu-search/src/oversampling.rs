//! Oversampling multiplier and its TTL cache.
//!
//! The shared index returns globally ranked rows. To leave enough rows for the
//! requesting chat after filtering, the candidate cap is scaled by the number
//! of chats in the collection. The count is cached and refreshed at most once
//! per TTL; concurrent refreshes are harmless.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use dejavu_core::defaults::{OVERSAMPLE_MAX, OVERSAMPLE_PER_CHAT};
use dejavu_core::{Collection, Result, VectorIndex};

/// Multiplier for a given number of distinct chats.
///
/// Always in `[1, OVERSAMPLE_MAX]` and non-decreasing in `chat_count`.
pub fn multiplier_for(chat_count: i64) -> i64 {
    if chat_count <= 1 {
        return 1;
    }
    chat_count
        .saturating_mul(OVERSAMPLE_PER_CHAT)
        .min(OVERSAMPLE_MAX)
}

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    chat_count: i64,
    refreshed_at: Instant,
}

/// Per-collection cache of distinct chat counts.
pub struct OversamplingCache {
    index: Arc<dyn VectorIndex>,
    ttl: Duration,
    entries: RwLock<HashMap<Collection, CachedCount>>,
}

impl OversamplingCache {
    pub fn new(index: Arc<dyn VectorIndex>, ttl: Duration) -> Self {
        Self {
            index,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Current multiplier for a collection, refreshing the count when stale.
    ///
    /// A failed refresh keeps serving the previous count. Only the very first
    /// lookup for a collection propagates the store error.
    pub async fn multiplier(&self, collection: Collection) -> Result<i64> {
        let cached = self.entries.read().await.get(&collection).copied();
        if let Some(entry) = cached {
            if entry.refreshed_at.elapsed() < self.ttl {
                return Ok(multiplier_for(entry.chat_count));
            }
        }

        let chat_count = match self.index.count_distinct_chats(collection).await {
            Ok(count) => count,
            Err(e) => match cached {
                Some(entry) => {
                    warn!(
                        subsystem = "search",
                        component = "oversampling",
                        collection = %collection,
                        error = %e,
                        "Chat count refresh failed, keeping stale multiplier"
                    );
                    return Ok(multiplier_for(entry.chat_count));
                }
                None => return Err(e),
            },
        };

        self.entries.write().await.insert(
            collection,
            CachedCount {
                chat_count,
                refreshed_at: Instant::now(),
            },
        );

        let multiplier = multiplier_for(chat_count);
        debug!(
            subsystem = "search",
            component = "oversampling",
            op = "refresh",
            collection = %collection,
            chat_count,
            multiplier,
            "Refreshed oversampling multiplier"
        );
        Ok(multiplier)
    }

    /// Drop every cached count so the next lookup hits the store.
    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use dejavu_core::{Error, SimilarityRow, Vector};

    /// Index that reports a configurable chat count and counts lookups.
    struct CountingIndex {
        chats: AtomicI64,
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingIndex {
        fn new(chats: i64) -> Arc<Self> {
            Arc::new(Self {
                chats: AtomicI64::new(chats),
                calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl VectorIndex for CountingIndex {
        async fn query_by_similarity(
            &self,
            _collection: Collection,
            _vector: &Vector,
            _min_similarity: f32,
            _limit: i64,
            _probes: u32,
        ) -> Result<Vec<SimilarityRow>> {
            Ok(Vec::new())
        }

        async fn count_distinct_chats(&self, _collection: Collection) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Search("index offline".to_string()));
            }
            Ok(self.chats.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn test_multiplier_bounds() {
        for count in [-3, 0, 1, 2, 3, 9, 10, 11, 1_000, i64::MAX] {
            let m = multiplier_for(count);
            assert!((1..=50).contains(&m), "count {} gave {}", count, m);
        }
        assert_eq!(multiplier_for(0), 1);
        assert_eq!(multiplier_for(1), 1);
        assert_eq!(multiplier_for(2), 10);
        assert_eq!(multiplier_for(10), 50);
        assert_eq!(multiplier_for(400), 50);
    }

    #[test]
    fn test_multiplier_is_monotonic() {
        let mut previous = multiplier_for(0);
        for count in 1..200 {
            let m = multiplier_for(count);
            assert!(m >= previous);
            previous = m;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_refreshes_after_ttl() {
        let index = CountingIndex::new(3);
        let cache = OversamplingCache::new(index.clone(), Duration::from_secs(1200));

        assert_eq!(cache.multiplier(Collection::MediaEmbeddings).await.unwrap(), 15);
        index.chats.store(20, Ordering::SeqCst);

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(cache.multiplier(Collection::MediaEmbeddings).await.unwrap(), 15);
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(cache.multiplier(Collection::MediaEmbeddings).await.unwrap(), 50);
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collections_cached_independently() {
        let index = CountingIndex::new(1);
        let cache = OversamplingCache::new(index.clone(), Duration::from_secs(60));

        cache.multiplier(Collection::MediaEmbeddings).await.unwrap();
        cache.multiplier(Collection::IgnoredMedia).await.unwrap();
        cache.multiplier(Collection::MediaEmbeddings).await.unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_tenant_is_one_in_any_ttl_state() {
        let index = CountingIndex::new(1);
        let cache = OversamplingCache::new(index.clone(), Duration::from_secs(10));

        assert_eq!(cache.multiplier(Collection::MediaEmbeddings).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.multiplier(Collection::MediaEmbeddings).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.multiplier(Collection::MediaEmbeddings).await.unwrap(), 1);

        // A failing refresh keeps the stale single-tenant answer
        index.fail.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.multiplier(Collection::MediaEmbeddings).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_first_lookup_failure_propagates() {
        let index = CountingIndex::new(4);
        index.fail.store(true, Ordering::SeqCst);
        let cache = OversamplingCache::new(index, Duration::from_secs(10));
        assert!(cache.multiplier(Collection::IgnoredMedia).await.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let index = CountingIndex::new(2);
        let cache = OversamplingCache::new(index.clone(), Duration::from_secs(3600));
        cache.multiplier(Collection::MediaEmbeddings).await.unwrap();
        cache.invalidate().await;
        cache.multiplier(Collection::MediaEmbeddings).await.unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    }
}
