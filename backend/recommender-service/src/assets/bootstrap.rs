use super::format::read_bincode;
use super::model::{FactorModel, LatentModel};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Resampled models of one slot, read from disk on first use and shared
/// read-only afterwards.
#[derive(Debug)]
pub struct BootstrapEnsemble {
    folder: PathBuf,
    max_models: usize,
    models: OnceCell<Arc<Vec<LatentModel>>>,
}

impl BootstrapEnsemble {
    pub fn new(folder: impl Into<PathBuf>, max_models: usize) -> Self {
        Self {
            folder: folder.into(),
            max_models,
            models: OnceCell::new(),
        }
    }

    /// An ensemble that is already populated and never touches disk.
    pub fn preloaded(models: Vec<LatentModel>) -> Self {
        let max_models = models.len();
        Self {
            folder: PathBuf::new(),
            max_models,
            models: OnceCell::with_value(Arc::new(models)),
        }
    }

    pub fn model_path(folder: &Path, index: usize) -> PathBuf {
        folder.join(format!("resampled_model_{}.bin", index))
    }

    pub fn models(&self) -> Arc<Vec<LatentModel>> {
        self.models
            .get_or_init(|| Arc::new(self.load_all()))
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }

    fn load_all(&self) -> Vec<LatentModel> {
        let mut models = Vec::new();
        for index in 1..=self.max_models {
            let path = Self::model_path(&self.folder, index);
            if !path.exists() {
                break;
            }
            match read_bincode::<FactorModel>(&path).and_then(LatentModel::new) {
                Ok(model) => models.push(model),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping resampled model"),
            }
        }
        info!(
            folder = %self.folder.display(),
            count = models.len(),
            "Loaded bootstrap ensemble"
        );
        models
    }
}
