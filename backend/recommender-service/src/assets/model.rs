use crate::error::{EngineError, Result};
use crate::models::{ItemId, UserId};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Training objective of a factor model; decides how new users are folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Confidence-weighted implicit feedback (`c = weight * r`).
    Implicit { weight: f64, regularization: f64 },
    /// Explicit ratings with global mean and item biases.
    Biased {
        regularization: f64,
        damping: f64,
        global_mean: f64,
        item_biases: Vec<f64>,
    },
}

/// Serialized form of a trained matrix-factorization model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorModel {
    pub kind: ModelKind,
    pub item_ids: Vec<ItemId>,
    pub item_factors: Array2<f64>,
    #[serde(default)]
    pub user_ids: Vec<UserId>,
    #[serde(default)]
    pub user_factors: Option<Array2<f64>>,
}

impl FactorModel {
    pub fn validate(&self) -> Result<()> {
        if self.item_ids.len() != self.item_factors.nrows() {
            return Err(EngineError::ModelLoad(format!(
                "{} item ids for {} item factor rows",
                self.item_ids.len(),
                self.item_factors.nrows()
            )));
        }
        if self.item_factors.ncols() == 0 {
            return Err(EngineError::ModelLoad("zero latent dimensions".into()));
        }
        if let ModelKind::Biased { item_biases, .. } = &self.kind {
            if item_biases.len() != self.item_ids.len() {
                return Err(EngineError::ModelLoad(format!(
                    "{} item biases for {} items",
                    item_biases.len(),
                    self.item_ids.len()
                )));
            }
        }
        if let Some(users) = &self.user_factors {
            if users.nrows() != self.user_ids.len() || users.ncols() != self.item_factors.ncols() {
                return Err(EngineError::ModelLoad(format!(
                    "user factors shape {:?} does not match {} users x {} dims",
                    users.shape(),
                    self.user_ids.len(),
                    self.item_factors.ncols()
                )));
            }
        }
        Ok(())
    }
}

/// A validated factor model with lookups precomputed for fold-in and scoring.
#[derive(Debug, Clone)]
pub struct LatentModel {
    factors: FactorModel,
    item_index: HashMap<ItemId, usize>,
    gram: Option<Array2<f64>>,
}

impl LatentModel {
    pub fn new(factors: FactorModel) -> Result<Self> {
        factors.validate()?;

        let mut item_index = HashMap::with_capacity(factors.item_ids.len());
        for (row, &item_id) in factors.item_ids.iter().enumerate() {
            if item_index.insert(item_id, row).is_some() {
                return Err(EngineError::ModelLoad(format!(
                    "duplicate item id {} in model",
                    item_id
                )));
            }
        }

        // YᵀY + λI, shared by every implicit fold-in
        let gram = match &factors.kind {
            ModelKind::Implicit { regularization, .. } => {
                let y = &factors.item_factors;
                let mut gram = y.t().dot(y);
                for i in 0..gram.nrows() {
                    gram[[i, i]] += regularization;
                }
                Some(gram)
            }
            ModelKind::Biased { .. } => None,
        };

        Ok(Self {
            factors,
            item_index,
            gram,
        })
    }

    pub fn kind(&self) -> &ModelKind {
        &self.factors.kind
    }

    pub fn dim(&self) -> usize {
        self.factors.item_factors.ncols()
    }

    pub fn n_items(&self) -> usize {
        self.factors.item_ids.len()
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.factors.item_ids
    }

    pub fn item_position(&self, item_id: ItemId) -> Option<usize> {
        self.item_index.get(&item_id).copied()
    }

    pub fn item_factors(&self) -> ArrayView2<'_, f64> {
        self.factors.item_factors.view()
    }

    pub fn gram(&self) -> Option<&Array2<f64>> {
        self.gram.as_ref()
    }

    /// Global mean and per-item bias for biased models, zeros otherwise.
    pub fn item_offset(&self, row: usize) -> f64 {
        match &self.factors.kind {
            ModelKind::Biased {
                global_mean,
                item_biases,
                ..
            } => global_mean + item_biases[row],
            ModelKind::Implicit { .. } => 0.0,
        }
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.factors.user_ids
    }

    pub fn user_factors(&self) -> Option<&Array2<f64>> {
        self.factors.user_factors.as_ref()
    }

    pub fn user_vector(&self, internal_id: usize) -> Option<ArrayView1<'_, f64>> {
        self.factors
            .user_factors
            .as_ref()
            .filter(|users| internal_id < users.nrows())
            .map(|users| users.row(internal_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn implicit_model() -> FactorModel {
        FactorModel {
            kind: ModelKind::Implicit {
                weight: 40.0,
                regularization: 0.1,
            },
            item_ids: vec![10, 20],
            item_factors: array![[1.0, 0.0], [0.0, 2.0]],
            user_ids: vec![],
            user_factors: None,
        }
    }

    #[test]
    fn test_gram_includes_regularization() {
        let model = LatentModel::new(implicit_model()).unwrap();
        let gram = model.gram().unwrap();

        assert!((gram[[0, 0]] - 1.1).abs() < 1e-12);
        assert!((gram[[1, 1]] - 4.1).abs() < 1e-12);
        assert_eq!(gram[[0, 1]], 0.0);
        assert_eq!(model.item_position(20), Some(1));
    }

    #[test]
    fn test_duplicate_item_ids_rejected() {
        let mut factors = implicit_model();
        factors.item_ids = vec![10, 10];
        assert!(matches!(
            LatentModel::new(factors),
            Err(EngineError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_bias_length_mismatch_rejected() {
        let mut factors = implicit_model();
        factors.kind = ModelKind::Biased {
            regularization: 0.1,
            damping: 5.0,
            global_mean: 3.5,
            item_biases: vec![0.1],
        };
        assert!(factors.validate().is_err());
    }
}
