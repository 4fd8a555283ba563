//! # Risk Budget Solver
//!
//! $$
//! \min_{\mathbf{y}>0}\ \tfrac12\,\mathbf{y}^\top\Sigma\mathbf{y}-\sum_i b_i\ln y_i,
//! \qquad \mathbf{w}=\mathbf{y}/\mathbf{1}^\top\mathbf{y}
//! $$
//!
//! The first-order conditions `y_i (Σy)_i = b_i` are exactly the risk budgets, and the
//! problem is strictly convex for a positive-definite `Σ`, so the minimiser is unique.
//! The search runs over `z = ln y` with L-BFGS, which keeps every iterate long-only and
//! fully invested after normalisation. Quality is reported by the risk budget deviation
//!
//! $$
//! f(\mathbf{w})=\sum_i\left(
//!   \frac{w_i(\Sigma\mathbf{w})_i}{\mathbf{w}^\top\Sigma\mathbf{w}}-b_i
//! \right)^2
//! $$

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use tracing::debug;

use super::covariance::portfolio_variance;
use super::covariance::sample_covariance;
use super::types::RiskBudget;
use super::types::SolverOutcome;
use crate::error::RiskBudgetError;

/// Objective value reported when the portfolio variance collapses.
const DEGENERATE_PENALTY: f64 = 1e10;

/// Tuning knobs for [`RiskBudgetSolver`].
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
  /// Iteration cap for a single L-BFGS run.
  pub max_iters: u64,
  /// Gradient norm at which an L-BFGS run stops.
  pub gradient_tolerance: f64,
  /// Change in the barrier cost below which an L-BFGS run stops.
  pub cost_tolerance: f64,
  /// Largest risk budget deviation `f(w)` accepted as a solution.
  pub objective_tolerance: f64,
  /// Extra runs started from the best point while the deviation keeps falling.
  pub max_restarts: usize,
  /// Portfolio variances below this are treated as degenerate.
  pub variance_floor: f64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_iters: 1_000,
      gradient_tolerance: 1e-9,
      cost_tolerance: 1e-14,
      objective_tolerance: 1e-8,
      max_restarts: 5,
      variance_floor: 1e-30,
    }
  }
}

/// Normalised `exp(z)`.
fn weights_from_logs(z: &[f64]) -> Array1<f64> {
  let max_z = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let mut w: Array1<f64> = z.iter().map(|&v| (v - max_z).exp()).collect();
  let total = w.sum();
  w /= total;
  w
}

/// Squared distance between the risk contributions of `w` and the budget.
fn budget_deviation(cov: &Array2<f64>, budget: &Array1<f64>, w: &Array1<f64>, floor: f64) -> f64 {
  let sigma_w = cov.dot(w);
  let port_var = w.dot(&sigma_w);
  if !port_var.is_finite() || port_var < floor {
    return DEGENERATE_PENALTY;
  }

  let rc = w * &sigma_w / port_var;
  let err = (rc - budget).mapv(|d| d * d).sum();
  if err.is_finite() {
    err
  } else {
    DEGENERATE_PENALTY
  }
}

#[derive(Clone)]
struct LogBarrierProblem {
  cov: Array2<f64>,
  budget: Array1<f64>,
}

impl LogBarrierProblem {
  fn value(&self, z: &[f64]) -> f64 {
    let y: Array1<f64> = z.iter().map(|v| v.exp()).collect();
    let barrier: f64 = self.budget.iter().zip(z).map(|(b, v)| b * v).sum();
    0.5 * y.dot(&self.cov.dot(&y)) - barrier
  }
}

impl CostFunction for LogBarrierProblem {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, z: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    Ok(self.value(z))
  }
}

impl Gradient for LogBarrierProblem {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, z: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    let y: Array1<f64> = z.iter().map(|v| v.exp()).collect();
    let sigma_y = self.cov.dot(&y);
    Ok(
      y.iter()
        .zip(sigma_y.iter())
        .zip(self.budget.iter())
        .map(|((yi, syi), bi)| yi * syi - bi)
        .collect(),
    )
  }
}

/// Result of one L-BFGS run.
struct Run {
  z: Vec<f64>,
  iterations: u64,
  converged: bool,
  message: String,
}

/// Finds weights whose variance contributions match a [`RiskBudget`].
#[derive(Clone, Debug, Default)]
pub struct RiskBudgetSolver {
  config: SolverConfig,
}

impl RiskBudgetSolver {
  pub fn new(config: SolverConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SolverConfig {
    &self.config
  }

  /// Solve on a `T x N` window of historical returns.
  pub fn solve(
    &self,
    sample: ArrayView2<'_, f64>,
    budget: &RiskBudget,
  ) -> Result<SolverOutcome, RiskBudgetError> {
    if budget.is_empty() {
      return Err(RiskBudgetError::optimization(sample.nrows(), "risk budget is empty"));
    }
    if sample.ncols() != budget.len() {
      return Err(RiskBudgetError::optimization(
        sample.nrows(),
        format!(
          "window has {} assets but the risk budget has {} entries",
          sample.ncols(),
          budget.len()
        ),
      ));
    }
    let cov = sample_covariance(sample)?;
    self
      .solve_covariance(cov.view(), budget)
      .map_err(|e| match e {
        RiskBudgetError::Optimization { reason, .. } => {
          RiskBudgetError::optimization(sample.nrows(), reason)
        }
        other => other,
      })
  }

  /// Solve directly on a covariance matrix.
  pub fn solve_covariance(
    &self,
    cov: ArrayView2<'_, f64>,
    budget: &RiskBudget,
  ) -> Result<SolverOutcome, RiskBudgetError> {
    let n = budget.len();
    if n == 0 {
      return Err(RiskBudgetError::optimization(0, "risk budget is empty"));
    }
    if cov.nrows() != cov.ncols() {
      return Err(RiskBudgetError::optimization(
        0,
        format!("covariance is {}x{}, expected square", cov.nrows(), cov.ncols()),
      ));
    }
    if cov.nrows() != n {
      return Err(RiskBudgetError::optimization(
        0,
        format!(
          "covariance is {n_cov}x{n_cov} but the risk budget has {n} entries",
          n_cov = cov.nrows()
        ),
      ));
    }
    if cov.iter().any(|v| !v.is_finite()) {
      return Err(RiskBudgetError::optimization(
        0,
        "covariance has non-finite entries",
      ));
    }

    let floor = self.config.variance_floor;
    let cov = cov.to_owned();
    let target = budget.as_array().clone();

    if n == 1 {
      let weights = Array1::ones(1);
      let objective = budget_deviation(&cov, &target, &weights, floor);
      return Ok(self.outcome(weights, objective, 0, true, "single asset".into()));
    }

    // The barrier has no minimum when an asset carries no variance.
    let equal = Array1::from_elem(n, 1.0 / n as f64);
    let equal_var = portfolio_variance(equal.view(), cov.view());
    if equal_var < floor || cov.diag().iter().any(|v| *v < floor) {
      return Ok(self.outcome(
        equal,
        DEGENERATE_PENALTY,
        0,
        false,
        "portfolio variance below floor".into(),
      ));
    }

    // Equal weights scaled onto y' Σ y = 1.
    let z0 = vec![(1.0 / n as f64).ln() - 0.5 * equal_var.ln(); n];
    let problem = LogBarrierProblem {
      cov: cov.clone(),
      budget: target.clone(),
    };

    let tolerance = self.config.objective_tolerance;
    let mut best = self.run_lbfgs(&problem, z0)?;
    let mut best_cost = problem.value(&best.z);
    let mut iterations = best.iterations;
    let mut restarts = 0;

    // Fresh L-BFGS memory from the best point until the barrier stops falling.
    while restarts < self.config.max_restarts {
      let objective = budget_deviation(&cov, &target, &weights_from_logs(&best.z), floor);
      if best.converged && objective <= tolerance {
        break;
      }

      let next = self.run_lbfgs(&problem, best.z.clone())?;
      iterations += next.iterations;
      restarts += 1;

      let next_cost = problem.value(&next.z);
      let improved = next_cost < best_cost;
      if improved || (next.converged && next_cost <= best_cost) {
        best = next;
        best_cost = next_cost;
      }
      if !improved {
        break;
      }
    }

    let weights = weights_from_logs(&best.z);
    let objective = budget_deviation(&cov, &target, &weights, floor);

    debug!(
      n_assets = n,
      iterations,
      restarts,
      objective,
      converged = best.converged,
      "risk budget solve finished"
    );

    Ok(self.outcome(weights, objective, iterations, best.converged, best.message))
  }

  fn run_lbfgs(&self, problem: &LogBarrierProblem, z0: Vec<f64>) -> Result<Run, RiskBudgetError> {
    let linesearch = MoreThuenteLineSearch::new()
      .with_c(1e-4, 0.9)
      .map_err(|e| RiskBudgetError::optimization(0, e.to_string()))?;
    let solver = LBFGS::new(linesearch, 10)
      .with_tolerance_grad(self.config.gradient_tolerance)
      .and_then(|s| s.with_tolerance_cost(self.config.cost_tolerance))
      .map_err(|e| RiskBudgetError::optimization(0, e.to_string()))?;

    let max_iters = self.config.max_iters;
    let start = z0.clone();
    let run = match Executor::new(problem.clone(), solver)
      .configure(|state| state.param(z0).max_iters(max_iters))
      .run()
    {
      Ok(res) => {
        let state = res.state();
        let reason = state.get_termination_reason().cloned();
        let converged = matches!(
          reason,
          Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
        );
        Run {
          z: state.get_best_param().cloned().unwrap_or(start),
          iterations: state.get_iter(),
          converged,
          message: reason
            .map(|r| format!("{r:?}"))
            .unwrap_or_else(|| "not terminated".to_string()),
        }
      }
      Err(e) => Run {
        z: start,
        iterations: 0,
        converged: false,
        message: e.to_string(),
      },
    };
    Ok(run)
  }

  fn outcome(
    &self,
    weights: Array1<f64>,
    objective: f64,
    iterations: u64,
    converged: bool,
    message: String,
  ) -> SolverOutcome {
    let finite = weights.iter().all(|w| w.is_finite());
    let invested = (weights.sum() - 1.0).abs() < 1e-6;
    let degenerate = objective >= DEGENERATE_PENALTY;
    let on_budget = objective <= self.config.objective_tolerance;

    let message = if degenerate {
      "portfolio variance below floor".to_string()
    } else if !finite {
      "non-finite weights".to_string()
    } else if converged && !on_budget {
      format!(
        "risk budget objective {objective:.3e} above tolerance {:.1e}",
        self.config.objective_tolerance
      )
    } else {
      message
    };

    SolverOutcome {
      success: converged && finite && invested && !degenerate && on_budget,
      weights,
      message,
      iterations,
      objective,
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::Array2;
  use ndarray::array;

  use super::*;
  use crate::portfolio::covariance::risk_contributions;
  use crate::portfolio::fixtures::factor_returns;

  fn assert_on_budget(weights: &Array1<f64>, cov: ArrayView2<'_, f64>, budget: &RiskBudget) {
    let rc = risk_contributions(weights.view(), cov).unwrap();
    for (got, want) in rc.iter().zip(budget.as_array().iter()) {
      assert_abs_diff_eq!(*got, *want, epsilon = 1e-4);
    }
  }

  #[test]
  fn uncorrelated_equal_variance_gives_equal_weights() {
    let cov = array![[0.04, 0.0], [0.0, 0.04]];
    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &RiskBudget::equal(2))
      .unwrap();

    assert!(out.success, "{}", out.message);
    assert_abs_diff_eq!(out.weights[0], 0.5, epsilon = 1e-4);
    assert_abs_diff_eq!(out.weights[1], 0.5, epsilon = 1e-4);
  }

  #[test]
  fn correlated_unequal_variance_tilts_to_low_variance_asset() {
    let cov = array![[0.04, 0.02], [0.02, 0.09]];
    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &RiskBudget::new(vec![0.5, 0.5]).unwrap())
      .unwrap();

    assert!(out.success, "{}", out.message);
    assert!(out.weights[0] > out.weights[1]);
    assert_abs_diff_eq!(out.weights.sum(), 1.0, epsilon = 1e-6);
    // 0.04 w1^2 = 0.09 w2^2 at the optimum
    assert_abs_diff_eq!(out.weights[0], 0.6, epsilon = 1e-3);
    assert_abs_diff_eq!(out.weights[1], 0.4, epsilon = 1e-3);
  }

  #[test]
  fn diagonal_covariance_with_equal_variances_gives_equal_weights() {
    let cov = Array2::from_diag(&array![0.02, 0.02, 0.02, 0.02]);
    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &RiskBudget::equal(4))
      .unwrap();

    assert!(out.success, "{}", out.message);
    for w in out.weights.iter() {
      assert_abs_diff_eq!(*w, 0.25, epsilon = 1e-4);
    }
  }

  #[test]
  fn matches_unequal_budget() {
    let cov = array![
      [0.04, 0.006, 0.0],
      [0.006, 0.09, 0.012],
      [0.0, 0.012, 0.16]
    ];
    let budget = RiskBudget::new(vec![0.5, 0.3, 0.2]).unwrap();
    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &budget)
      .unwrap();

    assert!(out.success, "{}", out.message);
    assert_abs_diff_eq!(out.weights.sum(), 1.0, epsilon = 1e-6);
    assert!(out.weights.iter().all(|w| *w > 0.0));
    assert_on_budget(&out.weights, cov.view(), &budget);
  }

  #[test]
  fn correlated_universes_reach_equal_risk() {
    for (n_assets, seed) in [(12, 1), (12, 2), (15, 1), (15, 3), (25, 7)] {
      let sample = factor_returns(500, n_assets, seed);
      let cov = sample_covariance(sample.view()).unwrap();
      let budget = RiskBudget::equal(n_assets);
      let out = RiskBudgetSolver::default()
        .solve(sample.view(), &budget)
        .unwrap();

      assert!(out.success, "n={n_assets} seed={seed}: {}", out.message);
      assert!(out.objective <= 1e-8);
      assert_abs_diff_eq!(out.weights.sum(), 1.0, epsilon = 1e-9);
      assert_on_budget(&out.weights, cov.view(), &budget);
    }
  }

  #[test]
  fn correlated_universe_matches_tilted_budget() {
    let n_assets = 15;
    let total = (n_assets * (n_assets + 1) / 2) as f64;
    let shares = (1..=n_assets).map(|i| i as f64 / total).collect();
    let budget = RiskBudget::new(shares).unwrap();
    let sample = factor_returns(500, n_assets, 11);
    let cov = sample_covariance(sample.view()).unwrap();

    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &budget)
      .unwrap();

    assert!(out.success, "{}", out.message);
    assert_on_budget(&out.weights, cov.view(), &budget);
  }

  #[test]
  fn early_stop_off_budget_is_not_success() {
    let cov = Array2::from_diag(&array![0.01, 0.04, 0.16]);
    let solver = RiskBudgetSolver::new(SolverConfig {
      gradient_tolerance: 1e3,
      max_restarts: 0,
      ..SolverConfig::default()
    });
    let out = solver
      .solve_covariance(cov.view(), &RiskBudget::equal(3))
      .unwrap();

    assert!(!out.success);
    assert!(out.objective > 1e-8);
    assert!(out.message.contains("objective"), "{}", out.message);
    assert_abs_diff_eq!(out.weights.sum(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn restarts_recover_from_an_early_stop() {
    let cov = array![
      [0.04, 0.006, 0.0],
      [0.006, 0.09, 0.012],
      [0.0, 0.012, 0.16]
    ];
    let capped = RiskBudgetSolver::new(SolverConfig {
      max_iters: 2,
      max_restarts: 0,
      ..SolverConfig::default()
    });
    let restarted = RiskBudgetSolver::new(SolverConfig {
      max_iters: 2,
      max_restarts: 200,
      ..SolverConfig::default()
    });
    let budget = RiskBudget::equal(3);

    let first = capped.solve_covariance(cov.view(), &budget).unwrap();
    let out = restarted.solve_covariance(cov.view(), &budget).unwrap();

    assert!(!first.success);
    assert!(out.success, "{}", out.message);
    assert!(out.iterations > first.iterations);
    assert_on_budget(&out.weights, cov.view(), &budget);
  }

  #[test]
  fn solves_from_return_sample() {
    let sample = array![
      [0.010, -0.004, 0.002],
      [-0.006, 0.008, 0.001],
      [0.004, 0.002, -0.003],
      [0.012, -0.010, 0.004],
      [-0.002, 0.006, -0.001],
      [0.007, 0.001, 0.002]
    ];
    let out = RiskBudgetSolver::default()
      .solve(sample.view(), &RiskBudget::equal(3))
      .unwrap();

    assert_abs_diff_eq!(out.weights.sum(), 1.0, epsilon = 1e-6);
    assert_eq!(out.weights.len(), 3);
  }

  #[test]
  fn single_asset_is_fully_invested() {
    let cov = array![[0.05]];
    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &RiskBudget::equal(1))
      .unwrap();

    assert!(out.success);
    assert_eq!(out.weights, array![1.0]);
  }

  #[test]
  fn zero_covariance_is_reported_as_failure() {
    let cov = Array2::<f64>::zeros((3, 3));
    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &RiskBudget::equal(3))
      .unwrap();

    assert!(!out.success);
    assert!(out.weights.iter().all(|w| w.is_finite()));
    assert_eq!(out.message, "portfolio variance below floor");
  }

  #[test]
  fn riskless_asset_is_reported_as_failure() {
    let cov = Array2::from_diag(&array![0.04, 0.0, 0.09]);
    let out = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &RiskBudget::equal(3))
      .unwrap();

    assert!(!out.success);
    assert_eq!(out.message, "portfolio variance below floor");
  }

  #[test]
  fn empty_budget_is_an_error() {
    let cov = Array2::<f64>::zeros((0, 0));
    let err = RiskBudgetSolver::default()
      .solve_covariance(cov.view(), &RiskBudget::equal(0))
      .unwrap_err();

    assert!(matches!(err, RiskBudgetError::Optimization { .. }));
  }

  #[test]
  fn budget_dimension_mismatch_is_an_error() {
    let cov = array![[0.04, 0.0], [0.0, 0.04]];
    let err = RiskBudgetSolver::default().solve_covariance(cov.view(), &RiskBudget::equal(3));

    assert!(err.is_err());
  }

  #[test]
  fn short_window_reports_window_size() {
    let sample = array![[0.01, 0.02]];
    let err = RiskBudgetSolver::default()
      .solve(sample.view(), &RiskBudget::equal(2))
      .unwrap_err();

    assert!(matches!(err, RiskBudgetError::Optimization { window: 1, .. }));
  }

  #[test]
  fn iteration_cap_clears_success_flag() {
    let cov = array![[0.04, 0.02], [0.02, 0.09]];
    let solver = RiskBudgetSolver::new(SolverConfig {
      max_iters: 1,
      max_restarts: 0,
      ..SolverConfig::default()
    });
    let out = solver
      .solve_covariance(cov.view(), &RiskBudget::equal(2))
      .unwrap();

    assert!(!out.success);
    assert_abs_diff_eq!(out.weights.sum(), 1.0, epsilon = 1e-12);
  }
}
