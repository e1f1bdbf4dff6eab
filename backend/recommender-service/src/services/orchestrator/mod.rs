// ============================================
// Recommendation Orchestrator
// ============================================
//
// Routes a request to its strategy, resolves the strategy's model slot,
// and turns per-request data shortfalls into empty results.

pub mod cache;
pub mod strategies;

pub use cache::{CacheKey, ResultCache};
pub use strategies::Strategy;

use crate::assets::EngineRegistry;
use crate::config::TuningConfig;
use crate::error::{EngineError, Result};
use crate::models::{RecommendationOutput, RecommendationRequest, StrategyKind};
use crate::services::diversity::DiversitySampler;
use crate::services::emotion::EmotionTuner;
use crate::services::projection::WarmStartProjector;
use crate::services::scoring::ScoreEngine;
use crate::services::uncertainty::UncertaintyEstimator;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Stateless components shared by every strategy.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub tuning: TuningConfig,
    pub projector: WarmStartProjector,
    pub scorer: ScoreEngine,
    pub sampler: DiversitySampler,
    pub tuner: EmotionTuner,
    pub estimator: UncertaintyEstimator,
}

impl EngineContext {
    pub fn new(tuning: TuningConfig) -> Self {
        Self {
            projector: WarmStartProjector::new(),
            scorer: ScoreEngine::new(tuning.discount_coefficient),
            sampler: DiversitySampler::new(tuning.viz_init_sample_size),
            tuner: EmotionTuner::new(tuning.emotion_norm, tuning.emotion_low_value, tuning.emotion_high_value),
            estimator: UncertaintyEstimator::new(tuning.min_bootstrap_models, tuning.min_neighbors),
            tuning,
        }
    }
}

pub struct RecommendationOrchestrator {
    registry: Arc<EngineRegistry>,
    ctx: EngineContext,
    strategies: HashMap<StrategyKind, Box<dyn Strategy>>,
    cache: ResultCache,
}

impl RecommendationOrchestrator {
    pub fn new(registry: Arc<EngineRegistry>, tuning: TuningConfig, cache_capacity: usize) -> Self {
        let strategies = strategies::all()
            .into_iter()
            .map(|strategy| (strategy.kind(), strategy))
            .collect();

        Self {
            registry,
            ctx: EngineContext::new(tuning),
            strategies,
            cache: ResultCache::new(cache_capacity),
        }
    }

    /// Unknown strategy ids and unavailable model slots are errors. Too
    /// little usable data for this user yields an empty result of the
    /// strategy's output shape.
    pub fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationOutput> {
        let start = Instant::now();
        let kind: StrategyKind = request.strategy.parse()?;

        let key = CacheKey::new(kind, request);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let strategy = self
            .strategies
            .get(&kind)
            .ok_or_else(|| EngineError::UnknownStrategy(kind.to_string()))?;
        let assets = self.registry.get(strategy.slot())?;

        let output = match strategy.recommend(&self.ctx, &assets, request) {
            Ok(output) => output,
            Err(e) if e.is_degradable() => {
                warn!(
                    user_id = %request.user_id,
                    strategy = %kind,
                    error = %e,
                    "Returning empty recommendations"
                );
                return Ok(RecommendationOutput::empty_for(kind));
            }
            Err(e) => return Err(e),
        };

        info!(
            user_id = %request.user_id,
            strategy = %kind,
            ratings = request.ratings.len(),
            results = output.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendations computed"
        );
        self.cache.put(key, output.clone());
        Ok(output)
    }

    /// Supported strategy ids.
    pub fn strategy_ids(&self) -> Vec<&'static str> {
        StrategyKind::ALL
            .iter()
            .filter(|kind| self.strategies.contains_key(kind))
            .map(|kind| kind.as_str())
            .collect()
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }
}
