use crate::assets::LatentModel;
use crate::error::{EngineError, Result};
use crate::models::{ItemId, RatingInput, UserLatentVector};
use crate::services::projection::WarmStartProjector;
use crate::services::scoring::{by_score_desc, ScoreEngine};
use crate::utils::{nan_std, nan_variance};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Per-item predictions from several models or users, one column each.
/// Missing predictions are stored as NaN.
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    items: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    rows: Vec<Vec<f64>>,
    columns: usize,
}

impl ScoreMatrix {
    pub fn new(items: &[ItemId]) -> Self {
        Self {
            items: items.to_vec(),
            positions: items.iter().enumerate().map(|(i, &item)| (item, i)).collect(),
            rows: vec![Vec::new(); items.len()],
            columns: 0,
        }
    }

    /// Add one column; items absent from `scores` get NaN.
    pub fn push_column(&mut self, scores: impl IntoIterator<Item = (ItemId, f64)>) {
        for row in &mut self.rows {
            row.push(f64::NAN);
        }
        for (item, score) in scores {
            if let Some(&pos) = self.positions.get(&item) {
                self.rows[pos][self.columns] = score;
            }
        }
        self.columns += 1;
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Population standard deviation per item over its valid values.
    pub fn std_by_item(&self) -> Vec<(ItemId, f64)> {
        self.reduce(nan_std)
    }

    /// Population variance per item over its valid values.
    pub fn variance_by_item(&self) -> Vec<(ItemId, f64)> {
        self.reduce(nan_variance)
    }

    fn reduce(&self, reducer: fn(&[f64]) -> Option<f64>) -> Vec<(ItemId, f64)> {
        self.items
            .iter()
            .zip(&self.rows)
            .map(|(&item, row)| (item, reducer(row).unwrap_or(f64::NAN)))
            .collect()
    }
}

/// Spread of predictions across bootstrap models or neighbors.
#[derive(Debug, Clone, Copy)]
pub struct UncertaintyEstimator {
    min_bootstrap_models: usize,
    min_neighbors: usize,
}

impl UncertaintyEstimator {
    pub fn new(min_bootstrap_models: usize, min_neighbors: usize) -> Self {
        Self {
            min_bootstrap_models,
            min_neighbors,
        }
    }

    /// Project the user into every resampled model and measure the per-item
    /// standard deviation of the predictions over `catalog`.
    pub fn bootstrap_std(
        &self,
        ratings: &RatingInput,
        models: &[LatentModel],
        catalog: &[ItemId],
    ) -> Result<Vec<(ItemId, f64)>> {
        let projector = WarmStartProjector::new();
        let scorer = ScoreEngine::default();
        let mut matrix = ScoreMatrix::new(catalog);

        for (index, model) in models.iter().enumerate() {
            match projector.project(ratings, model) {
                Ok(vector) => {
                    let scores = scorer.predict(&vector, model);
                    matrix.push_column(model.item_ids().iter().copied().zip(scores));
                }
                Err(e) => warn!(model = index + 1, error = %e, "Resampled model could not project user"),
            }
        }

        if matrix.columns() < self.min_bootstrap_models {
            return Err(EngineError::LowConfidence(format!(
                "{} of {} resampled models usable, need {}",
                matrix.columns(),
                models.len(),
                self.min_bootstrap_models
            )));
        }
        debug!(models = matrix.columns(), items = catalog.len(), "Bootstrap spread computed");
        Ok(matrix.std_by_item())
    }

    /// Score the catalog with each neighbor's vector and measure the per-item
    /// variance across neighbors.
    pub fn neighbor_variance(
        &self,
        neighbor_vectors: &[UserLatentVector],
        model: &LatentModel,
    ) -> Result<Vec<(ItemId, f64)>> {
        if neighbor_vectors.len() < self.min_neighbors {
            return Err(EngineError::LowConfidence(format!(
                "{} neighbors found, need {}",
                neighbor_vectors.len(),
                self.min_neighbors
            )));
        }

        let scorer = ScoreEngine::default();
        let mut matrix = ScoreMatrix::new(model.item_ids());
        for vector in neighbor_vectors {
            let scores = scorer.predict(vector, model);
            matrix.push_column(model.item_ids().iter().copied().zip(scores));
        }
        Ok(matrix.variance_by_item())
    }
}

impl Default for UncertaintyEstimator {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

/// The `n` items with the largest finite value, ties by ascending item id.
pub fn rank_highest(values: Vec<(ItemId, f64)>, exclude: &HashSet<ItemId>, n: usize) -> Vec<ItemId> {
    let mut finite: Vec<(ItemId, f64)> = values
        .into_iter()
        .filter(|(item, value)| value.is_finite() && !exclude.contains(item))
        .collect();
    finite.sort_by(|a, b| by_score_desc(a.1, b.1, a.0, b.0));
    finite.into_iter().take(n).map(|(item, _)| item).collect()
}
