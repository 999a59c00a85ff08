//! Ordinary least squares with coefficient standard errors.

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
}

impl OlsFit {
    pub fn t_stat(&self, index: usize) -> f64 {
        self.coefficients[index] / self.std_errors[index]
    }
}

/// Fits `y = X b + e` where `rows` holds the regressors of each observation.
/// Returns `None` when the design is singular or leaves no residual degrees
/// of freedom.
pub fn ols(rows: &[Vec<f64>], y: &[f64]) -> Option<OlsFit> {
    let n = rows.len();
    let k = rows.first().map(|r| r.len())?;
    if n != y.len() || n <= k || k == 0 {
        return None;
    }

    let x = DMatrix::from_fn(n, k, |i, j| rows[i][j]);
    let y_vec = DVector::from_column_slice(y);

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y_vec;
    let xtx_inv = xtx.try_inverse()?;
    let beta = &xtx_inv * xty;

    let residuals = &y_vec - &x * &beta;
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    let mse = sse / (n - k) as f64;

    let std_errors: Vec<f64> = (0..k).map(|j| (mse * xtx_inv[(j, j)]).sqrt()).collect();
    if std_errors.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return None;
    }

    Some(OlsFit {
        coefficients: beta.iter().copied().collect(),
        std_errors,
    })
}
