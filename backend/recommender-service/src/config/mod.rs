use crate::models::{BaselineSource, DistanceNorm, DiversityAlgorithm, DiversityCriteria, RankingRegime};
use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub models: ModelsConfig,
    pub tuning: TuningConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Asset folders for each model slot, relative to `models_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "default_implicit_folder")]
    pub implicit_folder: String,
    #[serde(default = "default_biased_folder")]
    pub biased_folder: String,
    #[serde(default = "default_emotion_folder")]
    pub emotion_folder: String,
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: usize,
    #[serde(default = "default_hnsw_ef_construction")]
    pub hnsw_ef_construction: usize,
    #[serde(default = "default_hnsw_ef_search")]
    pub hnsw_ef_search: usize,
    #[serde(default = "default_hnsw_seed")]
    pub hnsw_seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TuningConfig {
    #[serde(default = "default_discount_coefficient")]
    pub discount_coefficient: f64,
    #[serde(default = "default_hip_pool_size")]
    pub hip_pool_size: usize,
    #[serde(default = "default_controversial_neighbors")]
    pub controversial_neighbors: usize,
    #[serde(default = "default_community_search_neighbors")]
    pub community_search_neighbors: usize,
    #[serde(default = "default_advisor_count")]
    pub advisor_count: usize,
    #[serde(default = "default_advisor_pool_size")]
    pub advisor_pool_size: usize,
    #[serde(default = "default_bootstrap_models")]
    pub bootstrap_models: usize,
    #[serde(default = "default_min_bootstrap_models")]
    pub min_bootstrap_models: usize,
    #[serde(default = "default_min_neighbors")]
    pub min_neighbors: usize,
    #[serde(default = "default_viz_min_rating_count")]
    pub viz_min_rating_count: u64,
    #[serde(default = "default_viz_init_sample_size")]
    pub viz_init_sample_size: usize,
    #[serde(default = "default_viz_neighbors")]
    pub viz_neighbors: usize,
    #[serde(default = "default_viz_algorithm")]
    pub viz_algorithm: DiversityAlgorithm,
    #[serde(default = "default_viz_baseline")]
    pub viz_baseline: BaselineSource,
    #[serde(default = "default_emotion_item_pool_size")]
    pub emotion_item_pool_size: usize,
    #[serde(default = "default_emotion_sampling_size")]
    pub emotion_sampling_size: usize,
    #[serde(default = "default_emotion_low_value")]
    pub emotion_low_value: f64,
    #[serde(default = "default_emotion_high_value")]
    pub emotion_high_value: f64,
    #[serde(default = "default_emotion_norm")]
    pub emotion_norm: DistanceNorm,
    #[serde(default = "default_ranking_regime")]
    pub ranking_regime: RankingRegime,
    #[serde(default = "default_diversity_criteria")]
    pub diversity_criteria: DiversityCriteria,
    #[serde(default)]
    pub scale_vector: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 0 disables result caching
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_service_name() -> String {
    "recommender-service".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_implicit_folder() -> String {
    "implicit_mf".to_string()
}

fn default_biased_folder() -> String {
    "biased_mf".to_string()
}

fn default_emotion_folder() -> String {
    "emotion_mf".to_string()
}

fn default_hnsw_m() -> usize {
    16
}

fn default_hnsw_ef_construction() -> usize {
    200
}

fn default_hnsw_ef_search() -> usize {
    64
}

fn default_hnsw_seed() -> u64 {
    42
}

fn default_discount_coefficient() -> f64 {
    0.5
}

fn default_hip_pool_size() -> usize {
    1000
}

fn default_controversial_neighbors() -> usize {
    20
}

fn default_community_search_neighbors() -> usize {
    200
}

fn default_advisor_count() -> usize {
    7
}

fn default_advisor_pool_size() -> usize {
    200
}

fn default_bootstrap_models() -> usize {
    20
}

fn default_min_bootstrap_models() -> usize {
    2
}

fn default_min_neighbors() -> usize {
    2
}

fn default_viz_min_rating_count() -> u64 {
    50
}

fn default_viz_init_sample_size() -> usize {
    500
}

fn default_viz_neighbors() -> usize {
    200
}

fn default_viz_algorithm() -> DiversityAlgorithm {
    DiversityAlgorithm::FishnetSingleLinkage
}

fn default_viz_baseline() -> BaselineSource {
    BaselineSource::Global
}

fn default_emotion_item_pool_size() -> usize {
    200
}

fn default_emotion_sampling_size() -> usize {
    100
}

fn default_emotion_low_value() -> f64 {
    -0.125
}

fn default_emotion_high_value() -> f64 {
    0.125
}

fn default_emotion_norm() -> DistanceNorm {
    DistanceNorm::L1
}

fn default_ranking_regime() -> RankingRegime {
    RankingRegime::Weighted
}

fn default_diversity_criteria() -> DiversityCriteria {
    DiversityCriteria::Unspecified
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_format: default_log_format(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            implicit_folder: default_implicit_folder(),
            biased_folder: default_biased_folder(),
            emotion_folder: default_emotion_folder(),
            hnsw_m: default_hnsw_m(),
            hnsw_ef_construction: default_hnsw_ef_construction(),
            hnsw_ef_search: default_hnsw_ef_search(),
            hnsw_seed: default_hnsw_seed(),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            discount_coefficient: default_discount_coefficient(),
            hip_pool_size: default_hip_pool_size(),
            controversial_neighbors: default_controversial_neighbors(),
            community_search_neighbors: default_community_search_neighbors(),
            advisor_count: default_advisor_count(),
            advisor_pool_size: default_advisor_pool_size(),
            bootstrap_models: default_bootstrap_models(),
            min_bootstrap_models: default_min_bootstrap_models(),
            min_neighbors: default_min_neighbors(),
            viz_min_rating_count: default_viz_min_rating_count(),
            viz_init_sample_size: default_viz_init_sample_size(),
            viz_neighbors: default_viz_neighbors(),
            viz_algorithm: default_viz_algorithm(),
            viz_baseline: default_viz_baseline(),
            emotion_item_pool_size: default_emotion_item_pool_size(),
            emotion_sampling_size: default_emotion_sampling_size(),
            emotion_low_value: default_emotion_low_value(),
            emotion_high_value: default_emotion_high_value(),
            emotion_norm: default_emotion_norm(),
            ranking_regime: default_ranking_regime(),
            diversity_criteria: default_diversity_criteria(),
            scale_vector: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenv::dotenv().ok();

        Ok(Config {
            service: envy::prefixed("RECOMMENDER_").from_env()?,
            models: envy::prefixed("RECOMMENDER_MODEL_").from_env()?,
            tuning: envy::prefixed("RECOMMENDER_TUNING_").from_env()?,
            cache: envy::prefixed("RECOMMENDER_CACHE_").from_env()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.service.log_format.as_str(), "text" | "json") {
            bail!(
                "RECOMMENDER_LOG_FORMAT must be `text` or `json`, got `{}`",
                self.service.log_format
            );
        }
        if self.models.hnsw_m < 2 {
            bail!("RECOMMENDER_MODEL_HNSW_M must be at least 2");
        }
        if self.tuning.discount_coefficient < 0.0 {
            bail!("RECOMMENDER_TUNING_DISCOUNT_COEFFICIENT must not be negative");
        }
        if self.tuning.emotion_low_value >= self.tuning.emotion_high_value {
            bail!("RECOMMENDER_TUNING_EMOTION_LOW_VALUE must be below EMOTION_HIGH_VALUE");
        }
        if self.tuning.min_bootstrap_models == 0 || self.tuning.min_neighbors == 0 {
            bail!("uncertainty floors must be at least 1");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            models: ModelsConfig::default(),
            tuning: TuningConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}
