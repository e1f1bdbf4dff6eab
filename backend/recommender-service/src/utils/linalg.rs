use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Solve `a x = b` for a symmetric system. Tries Cholesky first and falls
/// back to LU with partial pivoting when `a` is not positive definite.
/// Returns `None` for singular systems.
pub fn solve_symmetric(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return None;
    }
    let matrix = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
    let rhs = DVector::from_iterator(n, b.iter().copied());

    let solution = match matrix.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&rhs),
        None => matrix.lu().solve(&rhs)?,
    };
    solution
        .iter()
        .all(|x| x.is_finite())
        .then(|| Array1::from_iter(solution.iter().copied()))
}
