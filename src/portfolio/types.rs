//! # Portfolio Types
//!
//! $$
//! b_i \ge 0,\qquad \sum_i b_i = 1
//! $$
//!
//! Risk budgets, solver results and rebalancing enums.

use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use chrono::NaiveDate;
use ndarray::Array1;

use crate::error::RiskBudgetError;

const BUDGET_TOLERANCE: f64 = 1e-6;

/// Target share of total portfolio variance for each asset.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskBudget(Array1<f64>);

impl RiskBudget {
  /// Validate a budget: non-empty, finite, non-negative and summing to one.
  pub fn new(shares: Vec<f64>) -> Result<Self, RiskBudgetError> {
    if shares.is_empty() {
      return Err(RiskBudgetError::data("risk budget is empty"));
    }
    if let Some(b) = shares.iter().find(|b| !b.is_finite() || **b < 0.0) {
      return Err(RiskBudgetError::data(format!(
        "risk budget entries must be finite and non-negative, found {b}"
      )));
    }
    let total: f64 = shares.iter().sum();
    if (total - 1.0).abs() > BUDGET_TOLERANCE {
      return Err(RiskBudgetError::data(format!(
        "risk budget must sum to 1, sums to {total}"
      )));
    }
    Ok(Self(Array1::from(shares)))
  }

  /// Equal risk contribution, `1/n` for every asset.
  pub fn equal(n: usize) -> Self {
    Self(Array1::from_elem(n, 1.0 / n as f64))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_array(&self) -> &Array1<f64> {
    &self.0
  }
}

/// Result of one weight solve, with convergence metadata.
#[derive(Clone, Debug)]
pub struct SolverOutcome {
  /// Best weights found (long-only, fully invested).
  pub weights: Array1<f64>,
  /// `true` when the search converged to finite, fully invested weights.
  pub success: bool,
  /// Human readable termination reason.
  pub message: String,
  /// Number of optimizer iterations.
  pub iterations: u64,
  /// Objective value at `weights`.
  pub objective: f64,
}

/// Calendar period that triggers a rebalance when it changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RebalanceFrequency {
  #[default]
  Monthly,
  Quarterly,
  Yearly,
}

/// Calendar bucket of a date for a given [`RebalanceFrequency`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeriodKey {
  year: i32,
  sub: u32,
}

impl RebalanceFrequency {
  pub fn period_of(&self, date: NaiveDate) -> PeriodKey {
    let sub = match self {
      Self::Monthly => date.month(),
      Self::Quarterly => (date.month() - 1) / 3 + 1,
      Self::Yearly => 0,
    };
    PeriodKey {
      year: date.year(),
      sub,
    }
  }
}

impl FromStr for RebalanceFrequency {
  type Err = RiskBudgetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "m" | "month" | "monthly" => Ok(Self::Monthly),
      "q" | "quarter" | "quarterly" => Ok(Self::Quarterly),
      "y" | "a" | "year" | "yearly" | "annual" => Ok(Self::Yearly),
      other => Err(RiskBudgetError::data(format!(
        "unknown rebalance frequency '{other}'"
      ))),
    }
  }
}

impl fmt::Display for RebalanceFrequency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Monthly => write!(f, "monthly"),
      Self::Quarterly => write!(f, "quarterly"),
      Self::Yearly => write!(f, "yearly"),
    }
  }
}

/// What the simulator does when a rebalance cannot be solved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
  /// Warn and keep the previous weights (equal weights if there are none yet).
  #[default]
  Fallback,
  /// Stop the run with an optimization error.
  Abort,
}

impl FromStr for FailurePolicy {
  type Err = RiskBudgetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "fallback" => Ok(Self::Fallback),
      "abort" => Ok(Self::Abort),
      other => Err(RiskBudgetError::data(format!(
        "unknown failure policy '{other}'"
      ))),
    }
  }
}
