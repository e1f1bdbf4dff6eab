//! Process-local result cache.
//!
//! Repeated requests with the same ratings and parameters skip projection and
//! scoring. Bounded by entry count with least-recently-used eviction.

use crate::models::{ItemId, RecommendationOutput, RecommendationRequest, StrategyKind, UserId};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use tracing::debug;

/// Identity of a request for caching: strategy, user, order-independent
/// ratings and the serialized parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    strategy: StrategyKind,
    user_id: UserId,
    ratings: Vec<(ItemId, u64)>,
    limit: usize,
    params: String,
}

impl CacheKey {
    pub fn new(strategy: StrategyKind, request: &RecommendationRequest) -> Self {
        Self {
            strategy,
            user_id: request.user_id.clone(),
            ratings: request.ratings.fingerprint(),
            limit: request.limit,
            params: serde_json::to_string(&request.params).unwrap_or_default(),
        }
    }
}

pub struct ResultCache {
    entries: Option<Mutex<LruCache<CacheKey, RecommendationOutput>>>,
}

impl ResultCache {
    /// A capacity of 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<RecommendationOutput> {
        let entries = self.entries.as_ref()?;
        let hit = entries.lock().get(key).cloned();
        debug!(strategy = %key.strategy, hit = hit.is_some(), "Result cache lookup");
        hit
    }

    pub fn put(&self, key: CacheKey, output: RecommendationOutput) {
        if let Some(entries) = &self.entries {
            entries.lock().put(key, output);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
