//! Per-chat search over a shared multi-tenant index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use dejavu_core::defaults::CHAT_COUNT_TTL_SECS;
use dejavu_core::{Error, Result, SearchPage, SimilarityQuery, VectorIndex};

use crate::dedup::{best_hits_for_chat, page};
use crate::oversampling::OversamplingCache;
use crate::probes::RecallTarget;

/// Configuration for [`TenantSearch`].
#[derive(Debug, Clone)]
pub struct TenantSearchConfig {
    /// How long a cached chat count stays fresh.
    pub chat_count_ttl: Duration,
    /// Accuracy knob passed to every index query.
    pub recall: RecallTarget,
}

impl Default for TenantSearchConfig {
    fn default() -> Self {
        Self {
            chat_count_ttl: Duration::from_secs(CHAT_COUNT_TTL_SECS),
            recall: RecallTarget::default(),
        }
    }
}

impl TenantSearchConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `CHAT_COUNT_TTL_SECS` | `1200` |
    /// | `SEARCH_RECALL` | `balanced` |
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("CHAT_COUNT_TTL_SECS") {
            let secs = v
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("Invalid CHAT_COUNT_TTL_SECS: {}", v)))?;
            config.chat_count_ttl = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("SEARCH_RECALL") {
            config.recall = v.parse()?;
        }
        Ok(config)
    }
}

/// Turns global ANN queries into correct per-chat result pages.
///
/// Owns the oversampling cache; construct once and share by reference.
pub struct TenantSearch {
    index: Arc<dyn VectorIndex>,
    oversampling: OversamplingCache,
    recall: RecallTarget,
}

impl TenantSearch {
    pub fn new(index: Arc<dyn VectorIndex>, config: TenantSearchConfig) -> Self {
        Self {
            oversampling: OversamplingCache::new(index.clone(), config.chat_count_ttl),
            index,
            recall: config.recall,
        }
    }

    pub fn oversampling(&self) -> &OversamplingCache {
        &self.oversampling
    }

    /// Search one chat's records.
    ///
    /// Fetches `(limit + offset) * multiplier` global candidates above the
    /// similarity floor, keeps the requesting chat's best row per record and
    /// returns the requested slice. `has_more` means the slice came back full.
    pub async fn search(&self, query: &SimilarityQuery) -> Result<SearchPage> {
        if query.limit <= 0 {
            return Err(Error::InvalidInput(format!(
                "search limit must be positive, got {}",
                query.limit
            )));
        }
        if query.offset < 0 {
            return Err(Error::InvalidInput(format!(
                "search offset must not be negative, got {}",
                query.offset
            )));
        }

        let window = query.limit.checked_add(query.offset).ok_or_else(|| {
            Error::InvalidInput(format!(
                "search window overflows: limit {} + offset {}",
                query.limit, query.offset
            ))
        })?;

        let start = Instant::now();
        let multiplier = self.oversampling.multiplier(query.collection).await?;
        let candidate_cap = window.saturating_mul(multiplier);

        let rows = self
            .index
            .query_by_similarity(
                query.collection,
                &query.vector,
                query.min_similarity,
                candidate_cap,
                self.recall.probes(),
            )
            .await?;
        let candidate_count = rows.len();

        let hits = best_hits_for_chat(rows, query.collection, query.chat_id);
        let (hits, has_more) = page(hits, query.limit as usize, query.offset as usize);

        debug!(
            subsystem = "search",
            component = "tenant",
            op = "search",
            collection = %query.collection,
            chat_id = query.chat_id,
            multiplier,
            candidate_count,
            result_count = hits.len(),
            has_more,
            duration_ms = start.elapsed().as_millis() as u64,
            "Per-chat search complete"
        );

        Ok(SearchPage { hits, has_more })
    }
}
