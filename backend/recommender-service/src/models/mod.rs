use crate::error::EngineError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub type ItemId = i64;
pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub item_id: ItemId,
    pub rating: f64,
}

/// A user's explicit ratings. Duplicate items keep the last value at the
/// position of the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Rating>", into = "Vec<Rating>")]
pub struct RatingInput {
    ratings: Vec<Rating>,
}

impl RatingInput {
    pub fn new(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let mut deduped: Vec<Rating> = Vec::new();
        for rating in ratings {
            match deduped.iter_mut().find(|r| r.item_id == rating.item_id) {
                Some(existing) => existing.rating = rating.rating,
                None => deduped.push(rating),
            }
        }
        Self { ratings: deduped }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rating> {
        self.ratings.iter()
    }

    pub fn as_slice(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn rated_items(&self) -> HashSet<ItemId> {
        self.ratings.iter().map(|r| r.item_id).collect()
    }

    /// Order-independent identity of the ratings, used for cache keys and seeds.
    pub fn fingerprint(&self) -> Vec<(ItemId, u64)> {
        let mut pairs: Vec<(ItemId, u64)> = self
            .ratings
            .iter()
            .map(|r| (r.item_id, r.rating.to_bits()))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    pub fn seed(&self) -> u64 {
        self.fingerprint()
            .iter()
            .fold(0xcbf2_9ce4_8422_2325_u64, |acc, (item, bits)| {
                (acc ^ (*item as u64) ^ bits.rotate_left(17)).wrapping_mul(0x0100_0000_01b3)
            })
    }
}

impl From<Vec<Rating>> for RatingInput {
    fn from(ratings: Vec<Rating>) -> Self {
        RatingInput::new(ratings)
    }
}

impl From<RatingInput> for Vec<Rating> {
    fn from(input: RatingInput) -> Self {
        input.ratings
    }
}

/// Projected user representation in the model's latent space.
#[derive(Debug, Clone, PartialEq)]
pub struct UserLatentVector {
    pub factors: Array1<f64>,
    pub bias: f64,
}

impl UserLatentVector {
    pub fn new(factors: Array1<f64>) -> Self {
        Self { factors, bias: 0.0 }
    }

    pub fn with_bias(factors: Array1<f64>, bias: f64) -> Self {
        Self { factors, bias }
    }

    pub fn dim(&self) -> usize {
        self.factors.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub item_id: ItemId,
    pub raw_score: f64,
    pub discounted_score: f64,
    pub popularity_count: u64,
    /// 0 when the item has no popularity record
    pub popularity_rank: u64,
    pub community_baseline: Option<f64>,
}

impl CandidateItem {
    pub fn new(item_id: ItemId, raw_score: f64) -> Self {
        Self {
            item_id,
            raw_score,
            discounted_score: raw_score,
            popularity_count: 0,
            popularity_rank: 0,
            community_baseline: None,
        }
    }
}

/// How an item entered a diversified selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTag {
    GridCell { row: usize, col: usize },
    Cluster(usize),
    Hull,
    Unassigned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiverseItem {
    pub candidate: CandidateItem,
    pub tag: SelectionTag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorProfile {
    pub neighbor_user_id: UserId,
    pub top_profile_items: Vec<ItemId>,
    pub sampled_recommendation: Option<ItemId>,
}

/// One point of the user-vs-community comparison plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub item_id: ItemId,
    pub community_score: f64,
    pub user_score: f64,
    pub community_label: i32,
    pub user_label: i32,
    pub cluster: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response_type", content = "items", rename_all = "snake_case")]
pub enum RecommendationOutput {
    Items(Vec<ItemId>),
    Advisors(BTreeMap<UserId, AdvisorProfile>),
    Preferences(Vec<PreferenceItem>),
}

impl RecommendationOutput {
    /// Empty result shaped like the given strategy's output.
    pub fn empty_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::PreferenceCommunity => {
                RecommendationOutput::Advisors(BTreeMap::new())
            }
            StrategyKind::PreferenceVizBaseline
            | StrategyKind::PreferenceVizDiverse
            | StrategyKind::PreferenceVizReference => {
                RecommendationOutput::Preferences(Vec::new())
            }
            _ => RecommendationOutput::Items(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecommendationOutput::Items(items) => items.len(),
            RecommendationOutput::Advisors(advisors) => advisors.len(),
            RecommendationOutput::Preferences(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TopN,
    Controversial,
    Hate,
    Hip,
    NoClue,
    PreferenceCommunity,
    PreferenceVizBaseline,
    PreferenceVizDiverse,
    PreferenceVizReference,
    EmotionTopN,
    EmotionDiverseN,
    EmotionTunedTopN,
    EmotionTunedDiverseN,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 13] = [
        StrategyKind::TopN,
        StrategyKind::Controversial,
        StrategyKind::Hate,
        StrategyKind::Hip,
        StrategyKind::NoClue,
        StrategyKind::PreferenceCommunity,
        StrategyKind::PreferenceVizBaseline,
        StrategyKind::PreferenceVizDiverse,
        StrategyKind::PreferenceVizReference,
        StrategyKind::EmotionTopN,
        StrategyKind::EmotionDiverseN,
        StrategyKind::EmotionTunedTopN,
        StrategyKind::EmotionTunedDiverseN,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TopN => "top_n",
            StrategyKind::Controversial => "controversial",
            StrategyKind::Hate => "hate",
            StrategyKind::Hip => "hip",
            StrategyKind::NoClue => "no_clue",
            StrategyKind::PreferenceCommunity => "preference_community",
            StrategyKind::PreferenceVizBaseline => "preference_viz_baseline",
            StrategyKind::PreferenceVizDiverse => "preference_viz_diverse",
            StrategyKind::PreferenceVizReference => "preference_viz_reference",
            StrategyKind::EmotionTopN => "emotion_top_n",
            StrategyKind::EmotionDiverseN => "emotion_diverse_n",
            StrategyKind::EmotionTunedTopN => "emotion_tuned_top_n",
            StrategyKind::EmotionTunedDiverseN => "emotion_tuned_diverse_n",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EngineError::UnknownStrategy(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTag {
    Anger,
    Anticipation,
    Disgust,
    Fear,
    Joy,
    Sadness,
    Surprise,
    Trust,
}

impl EmotionTag {
    pub const ALL: [EmotionTag; 8] = [
        EmotionTag::Anger,
        EmotionTag::Anticipation,
        EmotionTag::Disgust,
        EmotionTag::Fear,
        EmotionTag::Joy,
        EmotionTag::Sadness,
        EmotionTag::Surprise,
        EmotionTag::Trust,
    ];

    /// Column of this tag in the item emotion table.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLevel {
    Low,
    High,
    #[serde(other)]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteEmotion {
    pub emotion: EmotionTag,
    pub weight: EmotionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousEmotion {
    pub emotion: EmotionTag,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input_type", content = "emotions", rename_all = "snake_case")]
pub enum EmotionInput {
    Discrete(Vec<DiscreteEmotion>),
    Continuous(Vec<ContinuousEmotion>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceNorm {
    #[serde(alias = "cityblock")]
    L1,
    #[serde(alias = "euclidean")]
    L2,
    /// Sum of per-axis square roots, `Σ √|aᵢ − bᵢ|`.
    #[serde(rename = "sqrt_l1", alias = "sqrt_cityblock")]
    SqrtL1,
}

impl DistanceNorm {
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceNorm::L1 => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            DistanceNorm::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            DistanceNorm::SqrtL1 => a.iter().zip(b).map(|(x, y)| (x - y).abs().sqrt()).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingRegime {
    Distance,
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityCriteria {
    All,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityAlgorithm {
    Fishnet,
    SingleLinkage,
    StratifiedSingleLinkage,
    FishnetSingleLinkage,
    ConvexHull,
    Random,
    Top,
}

/// Where the community-side score of the comparison plot comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    Global,
    NeighborObserved,
    NeighborPredicted,
}

/// Optional per-request knobs. Unset fields fall back to tuning defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    pub emotion_input: Option<EmotionInput>,
    pub ranking_strategy: Option<RankingRegime>,
    pub diversity_criteria: Option<DiversityCriteria>,
    pub scale_vector: Option<bool>,
    /// Emotion distance; overrides the configured norm.
    pub distance_method: Option<DistanceNorm>,
    pub algorithm: Option<DiversityAlgorithm>,
    pub baseline: Option<BaselineSource>,
    pub init_sample_size: Option<usize>,
    pub min_rating_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub ratings: RatingInput,
    pub strategy: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub params: RequestParams,
}

fn default_limit() -> usize {
    10
}

impl RecommendationRequest {
    pub fn new(user_id: impl Into<UserId>, ratings: RatingInput, strategy: StrategyKind) -> Self {
        Self {
            user_id: user_id.into(),
            ratings,
            strategy: strategy.as_str().to_string(),
            limit: default_limit(),
            params: RequestParams::default(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }
}
