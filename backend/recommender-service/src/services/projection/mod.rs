use crate::assets::{LatentModel, ModelKind};
use crate::error::{EngineError, Result};
use crate::models::{RatingInput, UserLatentVector};
use crate::utils::solve_symmetric;
use ndarray::{Array1, Array2};
use tracing::debug;

/// Folds a new user's ratings into a frozen factor model.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarmStartProjector;

impl WarmStartProjector {
    pub fn new() -> Self {
        Self
    }

    /// Latent vector for `ratings`. Items outside the model vocabulary are
    /// ignored; if none remain the projection fails with `InsufficientData`.
    pub fn project(&self, ratings: &RatingInput, model: &LatentModel) -> Result<UserLatentVector> {
        let (rows, values): (Vec<usize>, Vec<f64>) = ratings
            .iter()
            .filter_map(|r| model.item_position(r.item_id).map(|row| (row, r.rating)))
            .unzip();

        let dropped = ratings.len() - rows.len();
        if dropped > 0 {
            debug!(dropped, kept = rows.len(), "Ignoring out-of-vocabulary ratings");
        }
        if rows.is_empty() {
            return Err(EngineError::InsufficientData(
                "no rated item is known to the model".into(),
            ));
        }

        match model.kind() {
            ModelKind::Implicit { weight, .. } => self.fold_in_implicit(model, &rows, &values, *weight),
            ModelKind::Biased {
                regularization,
                damping,
                global_mean,
                item_biases,
            } => self.fold_in_biased(
                model,
                &rows,
                &values,
                *regularization,
                *damping,
                *global_mean,
                item_biases,
            ),
        }
    }

    // (YᵀY + λI + Yᵣᵀ diag(c) Yᵣ) x = Yᵣᵀ (c + 1),  c = weight · r
    fn fold_in_implicit(
        &self,
        model: &LatentModel,
        rows: &[usize],
        values: &[f64],
        weight: f64,
    ) -> Result<UserLatentVector> {
        let gram = model
            .gram()
            .ok_or_else(|| EngineError::ModelLoad("implicit model without gram matrix".into()))?;
        let factors = model.item_factors();
        let d = model.dim();

        let mut a = gram.clone();
        let mut rhs = Array1::<f64>::zeros(d);
        for (&row, &rating) in rows.iter().zip(values) {
            let confidence = weight * rating;
            let y = factors.row(row);
            for i in 0..d {
                rhs[i] += (confidence + 1.0) * y[i];
                for j in 0..d {
                    a[[i, j]] += confidence * y[i] * y[j];
                }
            }
        }

        let x = solve_symmetric(&a, &rhs)
            .ok_or_else(|| EngineError::InsufficientData("singular fold-in system".into()))?;
        Ok(UserLatentVector::new(x))
    }

    // b_u = Σ(r − μ − b_i) / (n + damping);  (YᵣᵀYᵣ + λ n I) x = Yᵣᵀ (r − μ − b_i − b_u)
    #[allow(clippy::too_many_arguments)]
    fn fold_in_biased(
        &self,
        model: &LatentModel,
        rows: &[usize],
        values: &[f64],
        regularization: f64,
        damping: f64,
        global_mean: f64,
        item_biases: &[f64],
    ) -> Result<UserLatentVector> {
        let factors = model.item_factors();
        let d = model.dim();
        let n = rows.len() as f64;

        let residuals: Vec<f64> = rows
            .iter()
            .zip(values)
            .map(|(&row, &rating)| rating - global_mean - item_biases[row])
            .collect();
        let user_bias = residuals.iter().sum::<f64>() / (n + damping);

        let mut a = Array2::<f64>::zeros((d, d));
        let mut rhs = Array1::<f64>::zeros(d);
        for (&row, &residual) in rows.iter().zip(&residuals) {
            let error = residual - user_bias;
            let y = factors.row(row);
            for i in 0..d {
                rhs[i] += error * y[i];
                for j in 0..d {
                    a[[i, j]] += y[i] * y[j];
                }
            }
        }
        for i in 0..d {
            a[[i, i]] += regularization * n;
        }

        let x = solve_symmetric(&a, &rhs)
            .ok_or_else(|| EngineError::InsufficientData("singular fold-in system".into()))?;
        Ok(UserLatentVector::with_bias(x, user_bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::FactorModel;
    use crate::models::Rating;
    use ndarray::array;

    fn implicit_model() -> LatentModel {
        LatentModel::new(FactorModel {
            kind: ModelKind::Implicit {
                weight: 1.0,
                regularization: 0.5,
            },
            item_ids: vec![1, 2, 3],
            item_factors: array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            user_ids: vec![],
            user_factors: None,
        })
        .unwrap()
    }

    fn biased_model() -> LatentModel {
        LatentModel::new(FactorModel {
            kind: ModelKind::Biased {
                regularization: 0.1,
                damping: 5.0,
                global_mean: 3.0,
                item_biases: vec![0.5, -0.5, 0.0],
            },
            item_ids: vec![1, 2, 3],
            item_factors: array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            user_ids: vec![],
            user_factors: None,
        })
        .unwrap()
    }

    fn ratings(pairs: &[(i64, f64)]) -> RatingInput {
        RatingInput::new(pairs.iter().map(|&(item_id, rating)| Rating { item_id, rating }))
    }

    #[test]
    fn test_implicit_fold_in_solves_normal_equations() {
        let model = implicit_model();
        let vector = WarmStartProjector::new()
            .project(&ratings(&[(1, 2.0)]), &model)
            .unwrap();

        // gram = YᵀY + 0.5 I = [[2.5, 1], [1, 2.5]]; c = 2 adds 2 to a[0][0]
        // a = [[4.5, 1], [1, 2.5]], rhs = [3, 0]
        let expected_0 = 3.0 * 2.5 / (4.5 * 2.5 - 1.0);
        let expected_1 = -3.0 / (4.5 * 2.5 - 1.0);
        assert!((vector.factors[0] - expected_0).abs() < 1e-10);
        assert!((vector.factors[1] - expected_1).abs() < 1e-10);
        assert_eq!(vector.bias, 0.0);
    }

    #[test]
    fn test_biased_fold_in_damped_user_bias() {
        let model = biased_model();
        let vector = WarmStartProjector::new()
            .project(&ratings(&[(1, 5.0), (2, 3.0)]), &model)
            .unwrap();

        // residuals: 5 - 3 - 0.5 = 1.5, 3 - 3 + 0.5 = 0.5 → b_u = 2 / 7
        assert!((vector.bias - 2.0 / 7.0).abs() < 1e-12);

        // a = I + 0.2 I, rhs = residual - b_u per axis
        let expected_0 = (1.5 - 2.0 / 7.0) / 1.2;
        let expected_1 = (0.5 - 2.0 / 7.0) / 1.2;
        assert!((vector.factors[0] - expected_0).abs() < 1e-10);
        assert!((vector.factors[1] - expected_1).abs() < 1e-10);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let model = implicit_model();
        let input = ratings(&[(1, 4.0), (3, 2.5)]);
        let projector = WarmStartProjector::new();

        let first = projector.project(&input, &model).unwrap();
        let second = projector.project(&input, &model).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_vocabulary_items_are_ignored() {
        let model = implicit_model();
        let projector = WarmStartProjector::new();

        let with_unknown = projector
            .project(&ratings(&[(1, 4.0), (999, 5.0)]), &model)
            .unwrap();
        let without = projector.project(&ratings(&[(1, 4.0)]), &model).unwrap();
        assert_eq!(with_unknown, without);
    }

    #[test]
    fn test_no_known_items_is_insufficient_data() {
        let model = implicit_model();
        let result = WarmStartProjector::new().project(&ratings(&[(42, 3.0)]), &model);
        assert!(matches!(result, Err(EngineError::InsufficientData(_))));

        let empty = WarmStartProjector::new().project(&RatingInput::default(), &model);
        assert!(matches!(empty, Err(EngineError::InsufficientData(_))));
    }
}
