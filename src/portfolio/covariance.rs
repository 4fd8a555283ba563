//! # Covariance
//!
//! $$
//! \hat\Sigma = \frac{1}{T-1}\sum_{t=1}^{T}(r_t-\bar r)(r_t-\bar r)^\top,\qquad
//! RC_i = \frac{w_i(\Sigma w)_i}{w^\top\Sigma w}
//! $$
//!
//! Sample covariance of a return window and the risk decomposition of a weight vector.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray_stats::CorrelationExt;

use crate::error::RiskBudgetError;

/// Unbiased sample covariance of a `T x N` window of returns (rows are dates).
pub fn sample_covariance(sample: ArrayView2<'_, f64>) -> Result<Array2<f64>, RiskBudgetError> {
  let n_obs = sample.nrows();
  if sample.ncols() == 0 {
    return Err(RiskBudgetError::optimization(n_obs, "return window has no assets"));
  }
  if n_obs < 2 {
    return Err(RiskBudgetError::optimization(
      n_obs,
      "at least two observations are needed for a sample covariance",
    ));
  }

  let cov = sample
    .t()
    .cov(1.0)
    .map_err(|e| RiskBudgetError::optimization(n_obs, e.to_string()))?;

  if cov.iter().any(|v| !v.is_finite()) {
    return Err(RiskBudgetError::optimization(
      n_obs,
      "sample covariance has non-finite entries",
    ));
  }
  Ok(cov)
}

/// Total portfolio variance `w' Σ w`.
pub fn portfolio_variance(weights: ArrayView1<'_, f64>, cov: ArrayView2<'_, f64>) -> f64 {
  weights.dot(&cov.dot(&weights))
}

/// Fractional contribution of each asset to total portfolio variance.
///
/// Returns `None` when the portfolio variance is zero or not finite.
pub fn risk_contributions(
  weights: ArrayView1<'_, f64>,
  cov: ArrayView2<'_, f64>,
) -> Option<Array1<f64>> {
  let sigma_w = cov.dot(&weights);
  let var = weights.dot(&sigma_w);
  if !var.is_finite() || var.abs() < f64::MIN_POSITIVE {
    return None;
  }
  Some(&weights * &sigma_w / var)
}
