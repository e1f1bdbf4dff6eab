use super::{EmotionCandidate, EmotionQuery, EmotionTuner, SortOrder};
use crate::models::RankingRegime;
use crate::utils::{min_max, min_max_scale};

/// A tuned candidate with the score it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEmotionItem {
    pub item: EmotionCandidate,
    pub score: f64,
}

impl EmotionTuner {
    pub fn rank(
        &self,
        regime: RankingRegime,
        candidates: Vec<EmotionCandidate>,
        query: &EmotionQuery,
        scale_vector: bool,
    ) -> Vec<RankedEmotionItem> {
        match regime {
            RankingRegime::Distance => self.rank_by_distance(candidates, query, scale_vector),
            RankingRegime::Weighted => self.rank_weighted(candidates, query),
        }
    }

    /// Distance of each item's specified-tag values to the query targets.
    /// Discrete queries prefer the closest items, continuous ones the farthest.
    pub fn rank_by_distance(
        &self,
        candidates: Vec<EmotionCandidate>,
        query: &EmotionQuery,
        scale_vector: bool,
    ) -> Vec<RankedEmotionItem> {
        let mut target = query.values.clone();
        if scale_vector {
            for (col, tag) in query.tags.iter().enumerate() {
                let column: Vec<f64> = candidates.iter().map(|c| c.emotions[tag.index()]).collect();
                if let Some((min, max)) = min_max(&column) {
                    target[col] *= max - min;
                }
            }
        }

        let mut ranked: Vec<RankedEmotionItem> = candidates
            .into_iter()
            .map(|item| {
                let score = self.norm.distance(&item.restricted(&query.tags), &target);
                RankedEmotionItem { item, score }
            })
            .collect();

        // stable sort keeps the incoming order on ties
        match query.order {
            SortOrder::Ascending => ranked.sort_by(|a, b| a.score.total_cmp(&b.score)),
            SortOrder::Descending => ranked.sort_by(|a, b| b.score.total_cmp(&a.score)),
        }
        ranked
    }

    /// Blend of the incoming rank and the weighted tag values, all min-max
    /// scaled: `Σ scaled_i·w_i + (1 − Σ|w_i|)·scaled_rank`.
    pub fn rank_weighted(&self, candidates: Vec<EmotionCandidate>, query: &EmotionQuery) -> Vec<RankedEmotionItem> {
        let n = candidates.len();
        let original_rank: Vec<f64> = (0..n).map(|i| (n - i) as f64).collect();
        let scaled_rank = min_max_scale(&original_rank);
        let scaled_columns: Vec<Vec<f64>> = query
            .tags
            .iter()
            .map(|tag| {
                let column: Vec<f64> = candidates.iter().map(|c| c.emotions[tag.index()]).collect();
                min_max_scale(&column)
            })
            .collect();
        let rank_weight = 1.0 - query.values.iter().map(|w| w.abs()).sum::<f64>();

        let mut ranked: Vec<RankedEmotionItem> = candidates
            .into_iter()
            .enumerate()
            .map(|(row, item)| {
                let tag_score: f64 = scaled_columns
                    .iter()
                    .zip(&query.values)
                    .map(|(column, weight)| column[row] * weight)
                    .sum();
                RankedEmotionItem {
                    item,
                    score: tag_score + rank_weight * scaled_rank[row],
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContinuousEmotion, DiscreteEmotion, DistanceNorm, EmotionInput, EmotionLevel, EmotionTag};
    use crate::services::emotion::tests::emotion_candidate;

    fn ids(ranked: &[RankedEmotionItem]) -> Vec<i64> {
        ranked.iter().map(|r| r.item.candidate.item_id).collect()
    }

    fn with(joy: f64, fear: f64) -> [f64; 8] {
        let mut row = [0.0; 8];
        row[EmotionTag::Joy.index()] = joy;
        row[EmotionTag::Fear.index()] = fear;
        row
    }

    fn pool() -> Vec<super::EmotionCandidate> {
        vec![
            emotion_candidate(1, with(0.02, 0.30)),
            emotion_candidate(2, with(0.12, 0.05)),
            emotion_candidate(3, with(0.40, 0.10)),
            emotion_candidate(4, with(0.10, 0.20)),
        ]
    }

    #[test]
    fn test_discrete_distance_prefers_closest() {
        let input = EmotionInput::Discrete(vec![DiscreteEmotion {
            emotion: EmotionTag::Joy,
            weight: EmotionLevel::High,
        }]);
        let query = EmotionQuery::from_input(&input, -0.125, 0.125).unwrap();

        let ranked = EmotionTuner::default().rank_by_distance(pool(), &query, false);
        // |joy - 0.125|: 2 → 0.005, 4 → 0.025, 1 → 0.105, 3 → 0.275
        assert_eq!(ids(&ranked), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_continuous_distance_prefers_farthest() {
        let input = EmotionInput::Continuous(vec![ContinuousEmotion {
            emotion: EmotionTag::Fear,
            weight: -0.2,
        }]);
        let query = EmotionQuery::from_input(&input, -0.125, 0.125).unwrap();

        let ranked = EmotionTuner::new(DistanceNorm::L2, -0.125, 0.125).rank_by_distance(pool(), &query, false);
        assert_eq!(ids(&ranked), vec![1, 4, 3, 2]);
    }

    #[test]
    fn test_sqrt_l1_favors_many_small_gaps() {
        let input = EmotionInput::Discrete(vec![
            DiscreteEmotion {
                emotion: EmotionTag::Joy,
                weight: EmotionLevel::High,
            },
            DiscreteEmotion {
                emotion: EmotionTag::Fear,
                weight: EmotionLevel::High,
            },
        ]);
        let query = EmotionQuery::from_input(&input, -0.125, 0.125).unwrap();

        let l1 = EmotionTuner::new(DistanceNorm::L1, -0.125, 0.125).rank_by_distance(pool(), &query, false);
        assert_eq!(ids(&l1), vec![2, 4, 1, 3]);

        // item 1: √0.105 + √0.175 ≈ 0.742, item 3: √0.275 + √0.025 ≈ 0.683
        let sqrt_l1 = EmotionTuner::new(DistanceNorm::SqrtL1, -0.125, 0.125).rank_by_distance(pool(), &query, false);
        assert_eq!(ids(&sqrt_l1), vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_weighted_without_tags_keeps_order() {
        let ranked = EmotionTuner::default().rank_weighted(pool(), &EmotionQuery::open());
        assert_eq!(ids(&ranked), vec![1, 2, 3, 4]);
        assert!((ranked[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_score_independent_of_tag_order() {
        let forward = EmotionInput::Continuous(vec![
            ContinuousEmotion {
                emotion: EmotionTag::Joy,
                weight: 0.3,
            },
            ContinuousEmotion {
                emotion: EmotionTag::Fear,
                weight: -0.2,
            },
        ]);
        let backward = EmotionInput::Continuous(vec![
            ContinuousEmotion {
                emotion: EmotionTag::Fear,
                weight: -0.2,
            },
            ContinuousEmotion {
                emotion: EmotionTag::Joy,
                weight: 0.3,
            },
        ]);
        let tuner = EmotionTuner::default();

        let a = tuner.rank_weighted(pool(), &EmotionQuery::from_input(&forward, -0.125, 0.125).unwrap());
        let b = tuner.rank_weighted(pool(), &EmotionQuery::from_input(&backward, -0.125, 0.125).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_weighted_strong_tag_overrides_rank() {
        let input = EmotionInput::Continuous(vec![ContinuousEmotion {
            emotion: EmotionTag::Joy,
            weight: 1.0,
        }]);
        let query = EmotionQuery::from_input(&input, -0.125, 0.125).unwrap();

        let ranked = EmotionTuner::default().rank_weighted(pool(), &query);
        assert_eq!(ids(&ranked), vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_scaled_target() {
        let input = EmotionInput::Discrete(vec![DiscreteEmotion {
            emotion: EmotionTag::Joy,
            weight: EmotionLevel::High,
        }]);
        let query = EmotionQuery::from_input(&input, -0.125, 0.125).unwrap();

        // joy range 0.38 → target 0.0475: 1 → 0.0275, 2 → 0.0725, 4 → 0.0525, 3 → 0.3525
        let ranked = EmotionTuner::default().rank_by_distance(pool(), &query, true);
        assert_eq!(ids(&ranked), vec![1, 4, 2, 3]);
    }
}
