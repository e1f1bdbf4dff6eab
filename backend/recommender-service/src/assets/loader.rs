use super::bootstrap::BootstrapEnsemble;
use super::format::{read_bincode, read_compressed, read_csv};
use super::model::{FactorModel, LatentModel};
use super::tables::{
    EmotionColumns, HistoryColumns, ItemBaselineScore, ItemEmotions, ItemPopularity, UserHistory,
    UserIdMap, UserIdMapRow,
};
use super::{ModelAssets, UserAnn};
use crate::error::{EngineError, Result};
use crate::services::neighbors::hnsw::{AngularIndex, HnswParams};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const MODEL_FILE: &str = "model.bin";
pub const POPULARITY_FILE: &str = "item_popularity.csv";
pub const BASELINE_FILE: &str = "averaged_item_score.csv";
pub const USER_INDEX_FILE: &str = "user_index.bin";
pub const USER_INDEX_MAP_FILE: &str = "user_index_map.csv";
pub const HISTORY_FILE: &str = "user_history.bin.zst";
pub const EMOTIONS_FILE: &str = "item_emotions.bin.zst";

/// Reads one model folder into `ModelAssets`.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    hnsw: HnswParams,
    bootstrap_models: usize,
}

impl AssetLoader {
    pub fn new(hnsw: HnswParams, bootstrap_models: usize) -> Self {
        Self {
            hnsw,
            bootstrap_models,
        }
    }

    pub fn load(&self, name: &str, folder: &Path, require_emotions: bool) -> Result<ModelAssets> {
        let started = Instant::now();

        if !folder.is_dir() {
            return Err(EngineError::ModelLoad(format!(
                "model folder {} does not exist",
                folder.display()
            )));
        }

        let factors: FactorModel = read_bincode(&folder.join(MODEL_FILE))?;
        let latent = LatentModel::new(factors)?;
        debug!(
            model = name,
            items = latent.n_items(),
            dim = latent.dim(),
            "Factor model decoded"
        );

        let popularity: Vec<ItemPopularity> = read_csv(&folder.join(POPULARITY_FILE))?;

        let baseline_path = folder.join(BASELINE_FILE);
        let baseline: Vec<ItemBaselineScore> = if baseline_path.exists() {
            read_csv(&baseline_path)?
        } else {
            warn!(model = name, "No averaged item scores, community baselines disabled");
            Vec::new()
        };

        let ann = self.load_ann(name, folder, &latent)?;

        let history_path = folder.join(HISTORY_FILE);
        let history = if history_path.exists() {
            UserHistory::from_columns(read_compressed::<HistoryColumns>(&history_path)?)?
        } else {
            UserHistory::default()
        };

        let emotions_path = folder.join(EMOTIONS_FILE);
        let emotions = if emotions_path.exists() {
            Some(ItemEmotions::from_columns(read_compressed::<EmotionColumns>(
                &emotions_path,
            )?)?)
        } else if require_emotions {
            return Err(EngineError::ModelLoad(format!(
                "{} is required for model {}",
                EMOTIONS_FILE, name
            )));
        } else {
            None
        };

        let mut assets = ModelAssets::new(name, latent)
            .with_popularity(popularity)
            .with_baseline(baseline)
            .with_history(history)
            .with_bootstrap(BootstrapEnsemble::new(folder, self.bootstrap_models));
        if let Some(ann) = ann {
            assets = assets.with_ann(ann)?;
        }
        if let Some(emotions) = emotions {
            assets = assets.with_emotions(emotions);
        }

        info!(
            model = name,
            items = assets.latent().n_items(),
            users = assets.ann().map_or(0, |a| a.id_map.len()),
            history_users = assets.history().user_count(),
            emotions = assets.emotions().map_or(0, |e| e.len()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model assets loaded"
        );

        Ok(assets)
    }

    fn load_ann(&self, name: &str, folder: &Path, latent: &LatentModel) -> Result<Option<UserAnn>> {
        let Some(user_factors) = latent.user_factors() else {
            debug!(model = name, "Model has no user factors, neighbor search disabled");
            return Ok(None);
        };

        let index_path = folder.join(USER_INDEX_FILE);
        let map_path = folder.join(USER_INDEX_MAP_FILE);
        if index_path.exists() && map_path.exists() {
            let index: AngularIndex = read_bincode(&index_path)?;
            let id_map = UserIdMap::from_rows(read_csv::<UserIdMapRow>(&map_path)?)?;
            return Ok(Some(UserAnn { index, id_map }));
        }

        warn!(
            model = name,
            users = user_factors.nrows(),
            "No persisted user index, building one from user factors"
        );
        Ok(Some(UserAnn {
            index: AngularIndex::build(user_factors.view(), self.hnsw),
            id_map: UserIdMap::from_user_ids(latent.user_ids()),
        }))
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new(HnswParams::default(), 20)
    }
}
