pub mod diversify;
pub mod ranking;

use crate::assets::EMOTION_WIDTH;
use crate::error::{EngineError, Result};
use crate::models::{CandidateItem, DistanceNorm, DiversityCriteria, EmotionInput, EmotionLevel, EmotionTag};

/// A candidate joined with its emotion signature.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionCandidate {
    pub candidate: CandidateItem,
    pub emotions: [f64; EMOTION_WIDTH],
}

impl EmotionCandidate {
    /// Values of the given tags, in the order given.
    pub fn restricted(&self, tags: &[EmotionTag]) -> Vec<f64> {
        tags.iter().map(|tag| self.emotions[tag.index()]).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A user's emotion preferences: target values for the specified tags (in
/// canonical tag order) and the tags left open.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionQuery {
    pub tags: Vec<EmotionTag>,
    pub values: Vec<f64>,
    pub unspecified: Vec<EmotionTag>,
    pub order: SortOrder,
}

impl EmotionQuery {
    /// No preferences: every tag unspecified.
    pub fn open() -> Self {
        Self {
            tags: Vec::new(),
            values: Vec::new(),
            unspecified: EmotionTag::ALL.to_vec(),
            order: SortOrder::Descending,
        }
    }

    pub fn from_input(input: &EmotionInput, low_value: f64, high_value: f64) -> Result<Self> {
        let mut specified: Vec<(EmotionTag, f64)> = Vec::new();
        let mut mentioned: Vec<EmotionTag> = Vec::new();

        let order = match input {
            EmotionInput::Discrete(emotions) => {
                for emotion in emotions {
                    check_duplicate(&mut mentioned, emotion.emotion)?;
                    match emotion.weight {
                        EmotionLevel::Low => specified.push((emotion.emotion, low_value)),
                        EmotionLevel::High => specified.push((emotion.emotion, high_value)),
                        EmotionLevel::Unspecified => {}
                    }
                }
                SortOrder::Ascending
            }
            EmotionInput::Continuous(emotions) => {
                for emotion in emotions {
                    check_duplicate(&mut mentioned, emotion.emotion)?;
                    if !emotion.weight.is_finite() {
                        return Err(EngineError::InvalidInput(format!(
                            "weight for {:?} is not finite",
                            emotion.emotion
                        )));
                    }
                    if emotion.weight != 0.0 {
                        specified.push((emotion.emotion, emotion.weight));
                    }
                }
                SortOrder::Descending
            }
        };

        specified.sort_by_key(|(tag, _)| *tag);
        let unspecified = EmotionTag::ALL
            .iter()
            .copied()
            .filter(|tag| !specified.iter().any(|(t, _)| t == tag))
            .collect();
        let (tags, values) = specified.into_iter().unzip();

        Ok(Self {
            tags,
            values,
            unspecified,
            order,
        })
    }

    /// Tags the diversification step spreads over.
    pub fn diversity_tags(&self, criteria: DiversityCriteria) -> Vec<EmotionTag> {
        match criteria {
            DiversityCriteria::All => EmotionTag::ALL.to_vec(),
            DiversityCriteria::Unspecified => self.unspecified.clone(),
        }
    }
}

fn check_duplicate(mentioned: &mut Vec<EmotionTag>, tag: EmotionTag) -> Result<()> {
    if mentioned.contains(&tag) {
        return Err(EngineError::InvalidInput(format!(
            "emotion {:?} given more than once",
            tag
        )));
    }
    mentioned.push(tag);
    Ok(())
}

/// Re-ranks and diversifies candidates along the eight emotion dimensions.
#[derive(Debug, Clone, Copy)]
pub struct EmotionTuner {
    norm: DistanceNorm,
    low_value: f64,
    high_value: f64,
}

impl EmotionTuner {
    pub fn new(norm: DistanceNorm, low_value: f64, high_value: f64) -> Self {
        Self {
            norm,
            low_value,
            high_value,
        }
    }

    pub fn with_norm(self, norm: DistanceNorm) -> Self {
        Self { norm, ..self }
    }

    pub fn query(&self, input: Option<&EmotionInput>) -> Result<EmotionQuery> {
        match input {
            Some(input) => EmotionQuery::from_input(input, self.low_value, self.high_value),
            None => Ok(EmotionQuery::open()),
        }
    }
}

impl Default for EmotionTuner {
    fn default() -> Self {
        Self::new(DistanceNorm::L1, -0.125, 0.125)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ContinuousEmotion, DiscreteEmotion, ItemId};

    pub(crate) fn emotion_candidate(item_id: ItemId, emotions: [f64; EMOTION_WIDTH]) -> EmotionCandidate {
        EmotionCandidate {
            candidate: CandidateItem::new(item_id, 0.0),
            emotions,
        }
    }

    #[test]
    fn test_discrete_levels_map_to_targets() {
        let input = EmotionInput::Discrete(vec![
            DiscreteEmotion {
                emotion: EmotionTag::Joy,
                weight: EmotionLevel::High,
            },
            DiscreteEmotion {
                emotion: EmotionTag::Anger,
                weight: EmotionLevel::Low,
            },
            DiscreteEmotion {
                emotion: EmotionTag::Fear,
                weight: EmotionLevel::Unspecified,
            },
        ]);

        let query = EmotionQuery::from_input(&input, -0.125, 0.125).unwrap();
        assert_eq!(query.tags, vec![EmotionTag::Anger, EmotionTag::Joy]);
        assert_eq!(query.values, vec![-0.125, 0.125]);
        assert_eq!(query.order, SortOrder::Ascending);
        assert_eq!(query.unspecified.len(), 6);
        assert!(query.unspecified.contains(&EmotionTag::Fear));
    }

    #[test]
    fn test_continuous_drops_zero_weights() {
        let input = EmotionInput::Continuous(vec![
            ContinuousEmotion {
                emotion: EmotionTag::Trust,
                weight: 0.4,
            },
            ContinuousEmotion {
                emotion: EmotionTag::Sadness,
                weight: 0.0,
            },
        ]);

        let query = EmotionQuery::from_input(&input, -0.125, 0.125).unwrap();
        assert_eq!(query.tags, vec![EmotionTag::Trust]);
        assert_eq!(query.order, SortOrder::Descending);
        assert!(query.unspecified.contains(&EmotionTag::Sadness));
        assert_eq!(
            query.diversity_tags(DiversityCriteria::All).len(),
            EMOTION_WIDTH
        );
        assert_eq!(query.diversity_tags(DiversityCriteria::Unspecified).len(), 7);
    }

    #[test]
    fn test_duplicate_tags_rejected() {
        let input = EmotionInput::Continuous(vec![
            ContinuousEmotion {
                emotion: EmotionTag::Joy,
                weight: 0.1,
            },
            ContinuousEmotion {
                emotion: EmotionTag::Joy,
                weight: 0.2,
            },
        ]);
        assert!(matches!(
            EmotionQuery::from_input(&input, -0.125, 0.125),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_input_is_open_query() {
        let query = EmotionTuner::default().query(None).unwrap();
        assert!(query.tags.is_empty());
        assert_eq!(query.unspecified.len(), EMOTION_WIDTH);
    }
}
