pub mod hnsw;

pub use hnsw::{AngularIndex, HnswParams};

use crate::assets::{ModelAssets, UserAnn};
use crate::error::{EngineError, Result};
use crate::models::{ItemId, UserId, UserLatentVector};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Similar-user lookups over one model's user factors and rating history.
pub struct NeighborIndex<'a> {
    assets: &'a ModelAssets,
    ann: &'a UserAnn,
}

impl<'a> NeighborIndex<'a> {
    pub fn new(assets: &'a ModelAssets) -> Result<Self> {
        let ann = assets.ann().ok_or_else(|| {
            EngineError::ServiceUnavailable(format!(
                "{} model has no user index",
                assets.name()
            ))
        })?;
        Ok(Self { assets, ann })
    }

    /// Up to `k` user ids ordered by increasing angular distance, ties by
    /// index row, without duplicates and without `exclude`.
    pub fn knn(&self, vector: &UserLatentVector, k: usize, exclude: Option<&str>) -> Result<Vec<UserId>> {
        Ok(self
            .knn_with_distances(vector, k, exclude)?
            .into_iter()
            .map(|(user, _)| user)
            .collect())
    }

    pub fn knn_with_distances(
        &self,
        vector: &UserLatentVector,
        k: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<(UserId, f64)>> {
        if k == 0 || self.ann.index.is_empty() {
            return Ok(Vec::new());
        }
        if vector.dim() != self.ann.index.dim() {
            return Err(EngineError::InvalidInput(format!(
                "query dimension {} does not match index dimension {}",
                vector.dim(),
                self.ann.index.dim()
            )));
        }

        let query = vector.factors.to_vec();
        let fetch = if exclude.is_some() { k + 1 } else { k };
        let hits = self.ann.index.search(&query, fetch);

        let mut seen: HashSet<&str> = HashSet::new();
        let mut neighbors = Vec::with_capacity(k);
        for (internal, distance) in hits {
            let Some(user) = self.ann.id_map.external(internal) else {
                continue;
            };
            if exclude == Some(user.as_str()) || !seen.insert(user.as_str()) {
                continue;
            }
            neighbors.push((user.clone(), distance));
            if neighbors.len() == k {
                break;
            }
        }

        debug!(k, found = neighbors.len(), "Neighbor search finished");
        Ok(neighbors)
    }

    /// In-sample latent vector of a known user.
    pub fn neighbor_vector(&self, user_id: &str) -> Option<UserLatentVector> {
        let internal = self.ann.id_map.internal(user_id)?;
        self.assets
            .latent()
            .user_vector(internal)
            .map(|row| UserLatentVector::new(row.to_owned()))
    }

    pub fn neighbor_vectors(&self, user_ids: &[UserId]) -> Vec<UserLatentVector> {
        user_ids
            .iter()
            .filter_map(|user| self.neighbor_vector(user))
            .collect()
    }

    /// Mean observed rating of `item_id` among the neighbors, or `None` when
    /// fewer than `min_count` of them rated it.
    pub fn neighborhood_average(&self, neighbor_ids: &[UserId], item_id: ItemId, min_count: usize) -> Option<f64> {
        let history = self.assets.history();
        let ratings: Vec<f64> = neighbor_ids
            .iter()
            .filter_map(|user| history.rating(user, item_id))
            .collect();
        if ratings.is_empty() || ratings.len() < min_count {
            return None;
        }
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    }

    /// `neighborhood_average` for every item the neighbors rated at least
    /// `min_count` times.
    pub fn neighborhood_averages(&self, neighbor_ids: &[UserId], min_count: usize) -> HashMap<ItemId, f64> {
        let history = self.assets.history();
        let mut totals: HashMap<ItemId, (f64, usize)> = HashMap::new();
        for user in neighbor_ids {
            for &(item, rating) in history.ratings_of(user) {
                let entry = totals.entry(item).or_insert((0.0, 0));
                entry.0 += rating;
                entry.1 += 1;
            }
        }
        totals
            .into_iter()
            .filter(|(_, (_, count))| *count > 0 && *count >= min_count)
            .map(|(item, (sum, count))| (item, sum / count as f64))
            .collect()
    }

    /// Mean of the neighbors' predicted scores (user factors · item factors).
    pub fn predicted_neighborhood_average(&self, neighbor_ids: &[UserId]) -> HashMap<ItemId, f64> {
        let vectors = self.neighbor_vectors(neighbor_ids);
        let model = self.assets.latent();
        if vectors.is_empty() {
            return HashMap::new();
        }

        let factors = model.item_factors();
        let mut sums = vec![0.0; model.n_items()];
        for vector in &vectors {
            let scores = factors.dot(&vector.factors);
            for (sum, score) in sums.iter_mut().zip(scores.iter()) {
                *sum += score;
            }
        }

        model
            .item_ids()
            .iter()
            .zip(sums)
            .map(|(&item, sum)| (item, sum / vectors.len() as f64))
            .collect()
    }
}
