use super::EngineContext;
use crate::assets::{ModelAssets, ModelSlot};
use crate::error::{EngineError, Result};
use crate::models::{
    AdvisorProfile, BaselineSource, CandidateItem, EmotionTag, ItemId, PreferenceItem,
    RecommendationOutput, RecommendationRequest, StrategyKind, UserLatentVector,
};
use crate::services::diversity::{scale_and_label, DiversitySampler};
use crate::services::emotion::EmotionCandidate;
use crate::services::neighbors::NeighborIndex;
use crate::services::scoring::{by_score_desc, exclude_rated, rank_by_raw};
use crate::services::uncertainty::rank_highest;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One recommendation condition, bound to the model slot it reads from.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn slot(&self) -> ModelSlot;
    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput>;
}

/// One boxed strategy per kind.
pub fn all() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(TopNStrategy),
        Box::new(ControversialStrategy),
        Box::new(HateStrategy),
        Box::new(HipStrategy),
        Box::new(NoClueStrategy),
        Box::new(CommunityAdvisorStrategy),
        Box::new(VizBaselineStrategy),
        Box::new(VizDiverseStrategy),
        Box::new(VizReferenceStrategy),
        Box::new(EmotionStrategy::new(StrategyKind::EmotionTopN)),
        Box::new(EmotionStrategy::new(StrategyKind::EmotionDiverseN)),
        Box::new(EmotionStrategy::new(StrategyKind::EmotionTunedTopN)),
        Box::new(EmotionStrategy::new(StrategyKind::EmotionTunedDiverseN)),
    ]
}

/// Unrated catalog items in discounted order.
fn discounted_candidates(
    ctx: &EngineContext,
    assets: &ModelAssets,
    request: &RecommendationRequest,
) -> Result<Vec<CandidateItem>> {
    let vector = ctx.projector.project(&request.ratings, assets.latent())?;
    let scored = ctx.scorer.score_all(&vector, assets);
    let ranked = ctx.scorer.discount(scored, assets.discount_scale());
    Ok(exclude_rated(ranked, &request.ratings.rated_items()))
}

fn item_ids(candidates: impl IntoIterator<Item = CandidateItem>, limit: usize) -> RecommendationOutput {
    RecommendationOutput::Items(candidates.into_iter().take(limit).map(|c| c.item_id).collect())
}

// ============================================
// Implicit model strategies
// ============================================

pub struct TopNStrategy;

impl Strategy for TopNStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TopN
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Implicit
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let candidates = discounted_candidates(ctx, assets, request)?;
        Ok(item_ids(candidates, request.limit))
    }
}

/// Items the crowd rates well but the user is predicted to dislike.
pub struct HateStrategy;

impl Strategy for HateStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hate
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Implicit
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let mut margins: Vec<(ItemId, f64)> = discounted_candidates(ctx, assets, request)?
            .into_iter()
            .filter_map(|c| {
                assets
                    .baseline(c.item_id)
                    .map(|b| (c.item_id, b.ave_discounted_score - c.discounted_score))
            })
            .collect();
        margins.sort_by(|a, b| by_score_desc(a.1, b.1, a.0, b.0));

        Ok(RecommendationOutput::Items(
            margins.into_iter().take(request.limit).map(|(item, _)| item).collect(),
        ))
    }
}

/// High predicted score, low exposure.
pub struct HipStrategy;

impl Strategy for HipStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hip
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Implicit
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let mut pool: Vec<CandidateItem> = discounted_candidates(ctx, assets, request)?
            .into_iter()
            .take(ctx.tuning.hip_pool_size)
            .collect();
        // stable: equal counts keep discounted order
        pool.sort_by_key(|c| c.popularity_count);
        Ok(item_ids(pool, request.limit))
    }
}

/// Items the resampled models disagree on most.
pub struct NoClueStrategy;

impl Strategy for NoClueStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NoClue
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Implicit
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let models = assets.bootstrap().models();
        let spread = ctx
            .estimator
            .bootstrap_std(&request.ratings, &models, assets.latent().item_ids())?;
        Ok(RecommendationOutput::Items(rank_highest(
            spread,
            &request.ratings.rated_items(),
            request.limit,
        )))
    }
}

/// Items the user's nearest neighbors disagree on most.
pub struct ControversialStrategy;

impl Strategy for ControversialStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Controversial
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Implicit
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let vector = ctx.projector.project(&request.ratings, assets.latent())?;
        let index = NeighborIndex::new(assets)?;
        let neighbors = index.knn(&vector, ctx.tuning.controversial_neighbors, Some(&request.user_id))?;
        let vectors = index.neighbor_vectors(&neighbors);

        let variance = ctx.estimator.neighbor_variance(&vectors, assets.latent())?;
        Ok(RecommendationOutput::Items(rank_highest(
            variance,
            &request.ratings.rated_items(),
            request.limit,
        )))
    }
}

/// Nearest users as advisors, each with a profile and one sampled pick.
pub struct CommunityAdvisorStrategy;

impl Strategy for CommunityAdvisorStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PreferenceCommunity
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Implicit
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let vector = ctx.projector.project(&request.ratings, assets.latent())?;
        let index = NeighborIndex::new(assets)?;
        let neighbors = index.knn(&vector, ctx.tuning.community_search_neighbors, Some(&request.user_id))?;
        let rated = request.ratings.rated_items();

        let mut advisors = BTreeMap::new();
        for advisor_id in neighbors.into_iter().take(ctx.tuning.advisor_count) {
            let Some(advisor_vector) = index.neighbor_vector(&advisor_id) else {
                continue;
            };
            let predictions: Vec<CandidateItem> = ctx
                .scorer
                .predict(&advisor_vector, assets.latent())
                .into_iter()
                .zip(assets.latent().item_ids())
                .map(|(score, &item)| CandidateItem::new(item, score))
                .collect();
            let profile: Vec<ItemId> = rank_by_raw(predictions)
                .into_iter()
                .take(ctx.tuning.advisor_pool_size)
                .map(|c| c.item_id)
                .collect();

            let unrated: Vec<ItemId> = profile.iter().copied().filter(|item| !rated.contains(item)).collect();
            let mut rng = StdRng::seed_from_u64(request.ratings.seed() ^ advisor_seed(&advisor_id));
            let sampled_recommendation = unrated.choose(&mut rng).copied();

            advisors.insert(
                advisor_id.clone(),
                AdvisorProfile {
                    neighbor_user_id: advisor_id,
                    top_profile_items: profile.into_iter().take(request.limit).collect(),
                    sampled_recommendation,
                },
            );
        }

        debug!(advisors = advisors.len(), "Advisor profiles built");
        Ok(RecommendationOutput::Advisors(advisors))
    }
}

fn advisor_seed(advisor_id: &str) -> u64 {
    advisor_id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3))
}

// ============================================
// Preference visualization (biased model)
// ============================================

/// Unrated candidates with raw scores and popularity, in model order.
fn raw_candidates(
    ctx: &EngineContext,
    assets: &ModelAssets,
    request: &RecommendationRequest,
    vector: &UserLatentVector,
) -> Vec<CandidateItem> {
    let scored = ctx.scorer.score_all(vector, assets);
    exclude_rated(scored, &request.ratings.rated_items())
}

/// Attach the community score from `source` and keep the well-rated
/// candidates that have one.
fn with_community_baseline(
    ctx: &EngineContext,
    assets: &ModelAssets,
    request: &RecommendationRequest,
    source: BaselineSource,
    min_rating_count: u64,
) -> Result<Vec<CandidateItem>> {
    let vector = ctx.projector.project(&request.ratings, assets.latent())?;
    let candidates = raw_candidates(ctx, assets, request, &vector);

    let neighbor_baseline = |predicted: bool| -> Result<HashMap<ItemId, f64>> {
        let index = NeighborIndex::new(assets)?;
        let neighbors = index.knn(&vector, ctx.tuning.viz_neighbors, Some(&request.user_id))?;
        Ok(if predicted {
            index.predicted_neighborhood_average(&neighbors)
        } else {
            index.neighborhood_averages(&neighbors, min_rating_count as usize)
        })
    };
    let baseline: HashMap<ItemId, f64> = match source {
        BaselineSource::Global => candidates
            .iter()
            .filter_map(|c| assets.baseline(c.item_id).map(|b| (c.item_id, b.ave_score)))
            .collect(),
        BaselineSource::NeighborObserved => neighbor_baseline(false)?,
        BaselineSource::NeighborPredicted => neighbor_baseline(true)?,
    };

    Ok(candidates
        .into_iter()
        .filter(|c| c.popularity_count >= min_rating_count)
        .filter_map(|mut c| {
            let score = baseline.get(&c.item_id).copied().filter(|s| s.is_finite())?;
            c.community_baseline = Some(score);
            Some(c)
        })
        .collect())
}

/// Plain top-N by raw score without community comparison.
pub struct VizBaselineStrategy;

impl Strategy for VizBaselineStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PreferenceVizBaseline
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Biased
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let vector = ctx.projector.project(&request.ratings, assets.latent())?;
        let ranked = rank_by_raw(raw_candidates(ctx, assets, request, &vector));
        Ok(RecommendationOutput::Preferences(
            ranked
                .into_iter()
                .take(request.limit)
                .map(|c| PreferenceItem {
                    item_id: c.item_id,
                    community_score: 0.0,
                    user_score: c.raw_score,
                    community_label: -1,
                    user_label: -1,
                    cluster: -1,
                })
                .collect(),
        ))
    }
}

/// Spread of the user-vs-community plane with a selectable algorithm.
pub struct VizDiverseStrategy;

impl Strategy for VizDiverseStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PreferenceVizDiverse
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Biased
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let params = &request.params;
        let source = params.baseline.unwrap_or(ctx.tuning.viz_baseline);
        let algorithm = params.algorithm.unwrap_or(ctx.tuning.viz_algorithm);
        let min_rating_count = params.min_rating_count.unwrap_or(ctx.tuning.viz_min_rating_count);
        let sampler = sampler_for(ctx, params.init_sample_size);

        let candidates = with_community_baseline(ctx, assets, request, source, min_rating_count)?;
        if candidates.is_empty() {
            return Err(EngineError::InsufficientData(format!(
                "no candidates with at least {} ratings and a {:?} baseline",
                min_rating_count, source
            )));
        }

        let picked = sampler.sample(algorithm, candidates, request.limit, request.ratings.seed());
        debug!(?algorithm, ?source, picked = picked.len(), "Preference items diversified");
        Ok(RecommendationOutput::Preferences(scale_and_label(
            &picked,
            sampler.scale_min(),
            sampler.scale_max(),
        )))
    }
}

/// Neighbor-predicted baseline, fishnet then single-linkage.
pub struct VizReferenceStrategy;

impl Strategy for VizReferenceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PreferenceVizReference
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Biased
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let params = &request.params;
        let min_rating_count = params.min_rating_count.unwrap_or(ctx.tuning.viz_min_rating_count);
        let init = params.init_sample_size.unwrap_or(ctx.tuning.viz_init_sample_size);
        let sampler = sampler_for(ctx, Some(init));

        let candidates = with_community_baseline(
            ctx,
            assets,
            request,
            BaselineSource::NeighborPredicted,
            min_rating_count,
        )?;
        if candidates.is_empty() {
            return Err(EngineError::InsufficientData(
                "no candidates with a neighborhood baseline".to_string(),
            ));
        }

        let picked = sampler.grid_then_linkage(&candidates, init, request.limit);
        Ok(RecommendationOutput::Preferences(scale_and_label(
            &picked,
            sampler.scale_min(),
            sampler.scale_max(),
        )))
    }
}

fn sampler_for(ctx: &EngineContext, init_sample_size: Option<usize>) -> DiversitySampler {
    match init_sample_size {
        Some(size) => DiversitySampler::new(size),
        None => ctx.sampler,
    }
}

// ============================================
// Emotion strategies
// ============================================

/// The four emotion variants share one candidate pool and differ in the
/// post-processing they apply.
pub struct EmotionStrategy {
    kind: StrategyKind,
}

impl EmotionStrategy {
    pub fn new(kind: StrategyKind) -> Self {
        Self { kind }
    }

    /// Top discounted candidates that carry an emotion signature.
    fn pool(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<Vec<EmotionCandidate>> {
        let emotions = assets.emotions().ok_or_else(|| {
            EngineError::ServiceUnavailable(format!("{} model has no item emotions", assets.name()))
        })?;

        Ok(discounted_candidates(ctx, assets, request)?
            .into_iter()
            .take(ctx.tuning.emotion_item_pool_size)
            .filter_map(|candidate| {
                emotions.get(candidate.item_id).map(|row| EmotionCandidate {
                    candidate,
                    emotions: *row,
                })
            })
            .collect())
    }
}

impl Strategy for EmotionStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn slot(&self) -> ModelSlot {
        ModelSlot::Emotion
    }

    fn recommend(
        &self,
        ctx: &EngineContext,
        assets: &ModelAssets,
        request: &RecommendationRequest,
    ) -> Result<RecommendationOutput> {
        let params = &request.params;
        let tuning = &ctx.tuning;
        let tuner = params.distance_method.map_or(ctx.tuner, |norm| ctx.tuner.with_norm(norm));
        let pool = self.pool(ctx, assets, request)?;

        let ordered: Vec<EmotionCandidate> = match self.kind {
            StrategyKind::EmotionTopN => pool,
            StrategyKind::EmotionDiverseN => {
                tuner.diversify(pool, &EmotionTag::ALL, tuning.emotion_sampling_size)
            }
            StrategyKind::EmotionTunedTopN | StrategyKind::EmotionTunedDiverseN => {
                let query = tuner.query(params.emotion_input.as_ref())?;
                let regime = params.ranking_strategy.unwrap_or(tuning.ranking_regime);
                let scale_vector = params.scale_vector.unwrap_or(tuning.scale_vector);

                let pool = if self.kind == StrategyKind::EmotionTunedDiverseN {
                    let criteria = params.diversity_criteria.unwrap_or(tuning.diversity_criteria);
                    let tags = query.diversity_tags(criteria);
                    tuner.diversify(pool, &tags, tuning.emotion_sampling_size)
                } else {
                    pool
                };
                tuner
                    .rank(regime, pool, &query, scale_vector)
                    .into_iter()
                    .map(|ranked| ranked.item)
                    .collect()
            }
            other => {
                return Err(EngineError::UnknownStrategy(format!(
                    "{} is not an emotion strategy",
                    other
                )))
            }
        };

        debug!(kind = %self.kind, ordered = ordered.len(), "Emotion candidates ordered");
        Ok(item_ids(ordered.into_iter().map(|c| c.candidate), request.limit))
    }
}
