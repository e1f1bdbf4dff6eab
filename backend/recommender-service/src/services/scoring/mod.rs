use crate::assets::{LatentModel, ModelAssets};
use crate::models::{CandidateItem, ItemId, UserLatentVector};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Scores the catalog for a projected user and applies the popularity discount.
#[derive(Debug, Clone, Copy)]
pub struct ScoreEngine {
    coefficient: f64,
}

impl ScoreEngine {
    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }

    /// Raw prediction per model row: `x·q_i`, plus `μ + b_i + b_u` for biased models.
    pub fn predict(&self, vector: &UserLatentVector, model: &LatentModel) -> Vec<f64> {
        let dots = model.item_factors().dot(&vector.factors);
        dots.iter()
            .enumerate()
            .map(|(row, dot)| dot + model.item_offset(row) + vector.bias)
            .collect()
    }

    /// Every catalog item scored and joined with popularity; order follows the model.
    pub fn score_all(&self, vector: &UserLatentVector, assets: &ModelAssets) -> Vec<CandidateItem> {
        let model = assets.latent();
        let scale = assets.discount_scale();
        self.predict(vector, model)
            .into_iter()
            .zip(model.item_ids())
            .map(|(raw_score, &item_id)| {
                let mut candidate = CandidateItem::new(item_id, raw_score);
                if let Some(popularity) = assets.popularity(item_id) {
                    candidate.popularity_count = popularity.count;
                    candidate.popularity_rank = popularity.rank_popular;
                }
                candidate.discounted_score = self.discounted(raw_score, candidate.popularity_count, scale);
                candidate
            })
            .collect()
    }

    /// `discounted = raw − coefficient · count / scale`, sorted descending with
    /// ties broken by ascending item id.
    pub fn discount(&self, candidates: Vec<CandidateItem>, scale: f64) -> Vec<CandidateItem> {
        let mut discounted: Vec<CandidateItem> = candidates
            .into_iter()
            .map(|mut c| {
                c.discounted_score = self.discounted(c.raw_score, c.popularity_count, scale);
                c
            })
            .collect();
        discounted.sort_by(|a, b| by_score_desc(a.discounted_score, b.discounted_score, a.item_id, b.item_id));
        discounted
    }

    fn discounted(&self, raw_score: f64, count: u64, scale: f64) -> f64 {
        if scale <= 0.0 {
            return raw_score;
        }
        raw_score - self.coefficient * count as f64 / scale
    }
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Sort by raw score descending, ties by ascending item id.
pub fn rank_by_raw(mut candidates: Vec<CandidateItem>) -> Vec<CandidateItem> {
    candidates.sort_by(|a, b| by_score_desc(a.raw_score, b.raw_score, a.item_id, b.item_id));
    candidates
}

pub fn exclude_rated(candidates: Vec<CandidateItem>, rated: &HashSet<ItemId>) -> Vec<CandidateItem> {
    candidates
        .into_iter()
        .filter(|c| !rated.contains(&c.item_id))
        .collect()
}

/// Descending score order with NaN last and ascending id as the tie-break.
pub fn by_score_desc(a: f64, b: f64, a_id: ItemId, b_id: ItemId) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => a_id.cmp(&b_id),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a).then_with(|| a_id.cmp(&b_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{FactorModel, ItemPopularity, ModelKind};
    use ndarray::array;

    fn candidate(item_id: ItemId, raw: f64, count: u64) -> CandidateItem {
        CandidateItem {
            popularity_count: count,
            ..CandidateItem::new(item_id, raw)
        }
    }

    #[test]
    fn test_tied_scores_order_by_item_id() {
        let engine = ScoreEngine::default();
        let ranked = engine.discount(
            vec![candidate(3, 4.0, 0), candidate(1, 4.0, 0), candidate(2, 4.0, 0)],
            10.0,
        );

        let ids: Vec<ItemId> = ranked.iter().map(|c| c.item_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_popular_item_discounted_more() {
        let engine = ScoreEngine::default();
        let ranked = engine.discount(vec![candidate(1, 4.0, 100), candidate(2, 4.0, 10)], 1000.0);

        // A: 4.0 - 0.5 * 100 / 1000 = 3.95, B: 4.0 - 0.5 * 10 / 1000 = 3.995
        assert_eq!(ranked[0].item_id, 2);
        assert!((ranked[0].discounted_score - 3.995).abs() < 1e-12);
        assert!((ranked[1].discounted_score - 3.95).abs() < 1e-12);
    }

    #[test]
    fn test_discount_monotone_in_popularity() {
        let engine = ScoreEngine::default();
        let counts = [0, 5, 50, 500];
        let ranked = engine.discount(
            counts
                .iter()
                .enumerate()
                .map(|(i, &count)| candidate(i as ItemId, 3.0, count))
                .collect(),
            1000.0,
        );

        let scores: Vec<f64> = ranked.iter().map(|c| c.discounted_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranked[0].popularity_count, 0);
    }

    #[test]
    fn test_score_all_biased_adds_offsets() {
        let latent = LatentModel::new(FactorModel {
            kind: ModelKind::Biased {
                regularization: 0.1,
                damping: 5.0,
                global_mean: 3.0,
                item_biases: vec![0.5, -0.5],
            },
            item_ids: vec![10, 20],
            item_factors: array![[1.0, 0.0], [0.0, 1.0]],
            user_ids: vec![],
            user_factors: None,
        })
        .unwrap();
        let assets = ModelAssets::new("biased", latent).with_popularity(vec![ItemPopularity {
            item: 10,
            count: 40,
            rank_popular: 1,
            rank_quality: 1,
        }]);
        let vector = UserLatentVector::with_bias(array![0.2, 0.4], 0.1);

        let scored = ScoreEngine::default().score_all(&vector, &assets);
        assert!((scored[0].raw_score - (0.2 + 3.0 + 0.5 + 0.1)).abs() < 1e-12);
        assert!((scored[1].raw_score - (0.4 + 3.0 - 0.5 + 0.1)).abs() < 1e-12);
        assert_eq!(scored[0].popularity_count, 40);
        // scale 100 for a max count of 40
        assert!((scored[0].discounted_score - (scored[0].raw_score - 0.2)).abs() < 1e-12);
        assert_eq!(scored[1].popularity_count, 0);
    }

    #[test]
    fn test_rank_by_raw_and_exclude_rated() {
        let ranked = rank_by_raw(vec![candidate(1, 1.0, 0), candidate(2, 3.0, 0), candidate(3, 2.0, 0)]);
        let rated: HashSet<ItemId> = [2].into_iter().collect();
        let remaining = exclude_rated(ranked, &rated);

        let ids: Vec<ItemId> = remaining.iter().map(|c| c.item_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_nan_scores_sort_last() {
        let ranked = rank_by_raw(vec![candidate(1, f64::NAN, 0), candidate(2, 0.5, 0)]);
        assert_eq!(ranked[0].item_id, 2);
    }
}
