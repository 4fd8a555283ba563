//! # Errors
//!
//! Failure taxonomy shared by the loader, the solver and the simulator.

use std::fmt;

use chrono::NaiveDate;

/// Errors raised while loading data, solving for weights or running a backtest.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskBudgetError {
  /// Malformed or misaligned input tables.
  Data(String),
  /// The weight solver could not produce a usable weight vector.
  Optimization {
    /// Rebalance date, when the failure happened inside a simulation.
    date: Option<NaiveDate>,
    /// Number of observations in the estimation window.
    window: usize,
    reason: String,
  },
  /// Portfolio variance collapsed to zero or became non-finite.
  Degenerate(String),
}

impl RiskBudgetError {
  pub(crate) fn data(msg: impl Into<String>) -> Self {
    Self::Data(msg.into())
  }

  pub(crate) fn optimization(window: usize, reason: impl Into<String>) -> Self {
    Self::Optimization {
      date: None,
      window,
      reason: reason.into(),
    }
  }

  /// Attach the rebalance date to an optimization failure.
  pub fn at_date(self, at: NaiveDate) -> Self {
    match self {
      Self::Optimization { window, reason, .. } => Self::Optimization {
        date: Some(at),
        window,
        reason,
      },
      other => other,
    }
  }
}

impl fmt::Display for RiskBudgetError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Data(msg) => write!(f, "data error: {msg}"),
      Self::Optimization {
        date: Some(date),
        window,
        reason,
      } => write!(
        f,
        "optimization failed at {date} (window of {window} observations): {reason}"
      ),
      Self::Optimization {
        date: None,
        window,
        reason,
      } => write!(
        f,
        "optimization failed (window of {window} observations): {reason}"
      ),
      Self::Degenerate(msg) => write!(f, "degenerate portfolio: {msg}"),
    }
  }
}

impl std::error::Error for RiskBudgetError {}
