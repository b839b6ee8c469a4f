//! Dense symmetric positive definite solves for the GLM normal equations
//!
//! The systems are tiny (one row per model coefficient), so a plain Cholesky
//! factorisation is all that is needed.

use crate::io::error::{Result, computation_error};
use ndarray::{Array1, Array2};

/// Lower-triangular Cholesky factor `L` with `A = L Lᵀ`
///
/// # Errors
///
/// Returns an error if `a` isn't square or isn't positive definite, which for a
/// design matrix means collinear or constant columns
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(computation_error(
            "cholesky",
            &format!("matrix is {}x{}, not square", n, a.ncols()),
        ));
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut diagonal = a.get((j, j)).copied().unwrap_or(0.0);
        for k in 0..j {
            let v = l.get((j, k)).copied().unwrap_or(0.0);
            diagonal -= v * v;
        }
        if !(diagonal.is_finite() && diagonal > 0.0) {
            return Err(computation_error(
                "cholesky",
                &format!("matrix is not positive definite at column {j}"),
            ));
        }
        let pivot = diagonal.sqrt();
        if let Some(cell) = l.get_mut((j, j)) {
            *cell = pivot;
        }

        for i in j + 1..n {
            let mut sum = a.get((i, j)).copied().unwrap_or(0.0);
            for k in 0..j {
                sum -= l.get((i, k)).copied().unwrap_or(0.0) * l.get((j, k)).copied().unwrap_or(0.0);
            }
            if let Some(cell) = l.get_mut((i, j)) {
                *cell = sum / pivot;
            }
        }
    }
    Ok(l)
}

/// Solve `L Lᵀ x = b` given the Cholesky factor `L`
pub fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let at = |i: usize, j: usize| l.get((i, j)).copied().unwrap_or(0.0);

    // Forward substitution: L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b.get(i).copied().unwrap_or(0.0);
        for k in 0..i {
            sum -= at(i, k) * y.get(k).copied().unwrap_or(0.0);
        }
        if let Some(cell) = y.get_mut(i) {
            *cell = sum / at(i, i);
        }
    }

    // Back substitution: Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y.get(i).copied().unwrap_or(0.0);
        for k in i + 1..n {
            sum -= at(k, i) * x.get(k).copied().unwrap_or(0.0);
        }
        if let Some(cell) = x.get_mut(i) {
            *cell = sum / at(i, i);
        }
    }
    x
}

/// Inverse of a symmetric positive definite matrix
///
/// # Errors
///
/// Returns an error if the matrix isn't positive definite
pub fn spd_inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let l = cholesky(a)?;
    let n = a.nrows();
    let mut inverse = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut unit = Array1::<f64>::zeros(n);
        if let Some(cell) = unit.get_mut(j) {
            *cell = 1.0;
        }
        inverse.column_mut(j).assign(&cholesky_solve(&l, &unit));
    }
    Ok(inverse)
}
