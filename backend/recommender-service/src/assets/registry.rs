use super::loader::AssetLoader;
use super::ModelAssets;
use crate::config::{ModelsConfig, TuningConfig};
use crate::error::{EngineError, Result};
use crate::services::neighbors::hnsw::HnswParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Model variant a strategy runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSlot {
    Implicit,
    Biased,
    Emotion,
}

impl ModelSlot {
    pub const ALL: [ModelSlot; 3] = [ModelSlot::Implicit, ModelSlot::Biased, ModelSlot::Emotion];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSlot::Implicit => "implicit",
            ModelSlot::Biased => "biased",
            ModelSlot::Emotion => "emotion",
        }
    }
}

impl fmt::Display for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loaded assets per slot. Built once at startup and shared by handle.
#[derive(Debug, Default)]
pub struct EngineRegistry {
    slots: HashMap<ModelSlot, Arc<ModelAssets>>,
    failures: HashMap<ModelSlot, String>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every configured slot. A slot that fails stays unavailable and
    /// the rest of the engine keeps serving.
    pub fn load(models: &ModelsConfig, tuning: &TuningConfig) -> Self {
        let loader = AssetLoader::new(
            HnswParams {
                m: models.hnsw_m,
                ef_construction: models.hnsw_ef_construction,
                ef_search: models.hnsw_ef_search,
                seed: models.hnsw_seed,
            },
            tuning.bootstrap_models,
        );

        let mut registry = Self::new();
        for slot in ModelSlot::ALL {
            let folder_name = match slot {
                ModelSlot::Implicit => &models.implicit_folder,
                ModelSlot::Biased => &models.biased_folder,
                ModelSlot::Emotion => &models.emotion_folder,
            };
            let folder = models.models_dir.join(folder_name);

            match loader.load(slot.as_str(), &folder, slot == ModelSlot::Emotion) {
                Ok(assets) => {
                    registry = registry.register(slot, assets);
                }
                Err(e) => {
                    error!(slot = %slot, folder = %folder.display(), error = %e, "Failed to load model assets");
                    registry.failures.insert(slot, e.to_string());
                }
            }
        }

        info!(
            available = ?registry.available(),
            "Engine registry ready"
        );
        registry
    }

    pub fn register(mut self, slot: ModelSlot, assets: ModelAssets) -> Self {
        self.failures.remove(&slot);
        self.slots.insert(slot, Arc::new(assets));
        self
    }

    pub fn get(&self, slot: ModelSlot) -> Result<Arc<ModelAssets>> {
        self.slots.get(&slot).cloned().ok_or_else(|| {
            let reason = self
                .failures
                .get(&slot)
                .map(String::as_str)
                .unwrap_or("not loaded");
            EngineError::ServiceUnavailable(format!("{} model: {}", slot, reason))
        })
    }

    pub fn available(&self) -> Vec<ModelSlot> {
        ModelSlot::ALL
            .into_iter()
            .filter(|slot| self.slots.contains_key(slot))
            .collect()
    }
}
