// ============================================
// Model Assets
// ============================================
//
// Read-only artifacts of one trained model variant:
// factor model, popularity and baseline tables, user ANN index,
// rating history, item emotions and the lazily loaded bootstrap ensemble.

pub mod bootstrap;
pub mod format;
pub mod loader;
pub mod model;
pub mod registry;
pub mod tables;

pub use bootstrap::BootstrapEnsemble;
pub use loader::AssetLoader;
pub use model::{FactorModel, LatentModel, ModelKind};
pub use registry::{EngineRegistry, ModelSlot};
pub use tables::{
    EmotionColumns, HistoryColumns, ItemBaselineScore, ItemEmotions, ItemPopularity, UserHistory,
    UserIdMap, UserIdMapRow, EMOTION_WIDTH,
};

use crate::error::{EngineError, Result};
use crate::models::ItemId;
use crate::services::neighbors::hnsw::AngularIndex;
use crate::utils::digit_count;
use std::collections::HashMap;

/// ANN graph over the model's user factors plus the row ↔ user id mapping.
#[derive(Debug, Clone)]
pub struct UserAnn {
    pub index: AngularIndex,
    pub id_map: UserIdMap,
}

#[derive(Debug)]
pub struct ModelAssets {
    name: String,
    latent: LatentModel,
    popularity: HashMap<ItemId, ItemPopularity>,
    baseline: HashMap<ItemId, ItemBaselineScore>,
    ann: Option<UserAnn>,
    history: UserHistory,
    emotions: Option<ItemEmotions>,
    bootstrap: BootstrapEnsemble,
    discount_scale: f64,
}

impl ModelAssets {
    pub fn new(name: impl Into<String>, latent: LatentModel) -> Self {
        Self {
            name: name.into(),
            latent,
            popularity: HashMap::new(),
            baseline: HashMap::new(),
            ann: None,
            history: UserHistory::default(),
            emotions: None,
            bootstrap: BootstrapEnsemble::preloaded(Vec::new()),
            discount_scale: 10.0,
        }
    }

    pub fn with_popularity(mut self, rows: Vec<ItemPopularity>) -> Self {
        let max_count = rows.iter().map(|r| r.count).max().unwrap_or(0);
        self.discount_scale = 10f64.powi(digit_count(max_count) as i32);
        self.popularity = rows.into_iter().map(|r| (r.item, r)).collect();
        self
    }

    pub fn with_baseline(mut self, rows: Vec<ItemBaselineScore>) -> Self {
        self.baseline = rows.into_iter().map(|r| (r.item, r)).collect();
        self
    }

    pub fn with_ann(mut self, ann: UserAnn) -> Result<Self> {
        ann.index.validate()?;
        if ann.index.len() != ann.id_map.len() {
            return Err(EngineError::ModelLoad(format!(
                "user index holds {} vectors but id map has {} users",
                ann.index.len(),
                ann.id_map.len()
            )));
        }
        if !ann.index.is_empty() && ann.index.dim() != self.latent.dim() {
            return Err(EngineError::ModelLoad(format!(
                "user index dimension {} does not match model dimension {}",
                ann.index.dim(),
                self.latent.dim()
            )));
        }
        if let Some(users) = self.latent.user_factors() {
            if users.nrows() != ann.index.len() {
                return Err(EngineError::ModelLoad(format!(
                    "user index holds {} vectors for {} user factor rows",
                    ann.index.len(),
                    users.nrows()
                )));
            }
        }
        self.ann = Some(ann);
        Ok(self)
    }

    pub fn with_history(mut self, history: UserHistory) -> Self {
        self.history = history;
        self
    }

    pub fn with_emotions(mut self, emotions: ItemEmotions) -> Self {
        self.emotions = Some(emotions);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: BootstrapEnsemble) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latent(&self) -> &LatentModel {
        &self.latent
    }

    pub fn popularity(&self, item_id: ItemId) -> Option<&ItemPopularity> {
        self.popularity.get(&item_id)
    }

    pub fn baseline(&self, item_id: ItemId) -> Option<&ItemBaselineScore> {
        self.baseline.get(&item_id)
    }

    pub fn ann(&self) -> Option<&UserAnn> {
        self.ann.as_ref()
    }

    pub fn history(&self) -> &UserHistory {
        &self.history
    }

    pub fn emotions(&self) -> Option<&ItemEmotions> {
        self.emotions.as_ref()
    }

    pub fn bootstrap(&self) -> &BootstrapEnsemble {
        &self.bootstrap
    }

    /// `10^digits(max popularity count)`
    pub fn discount_scale(&self) -> f64 {
        self.discount_scale
    }
}
