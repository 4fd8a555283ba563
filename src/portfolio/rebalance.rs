//! # Rebalancing Simulator
//!
//! $$
//! R^p_t = \mathbf{w}_{\tau(t)}^\top \mathbf{r}_t,\qquad
//! \mathbf{w}_{\tau} = \operatorname{solve}\big(\{\mathbf{r}_s\}_{s<\tau},\ \mathbf{b}\big)
//! $$
//!
//! Walks the return series from a start date, re-solving the weights whenever a new
//! calendar period begins and carrying them forward otherwise. `τ(t)` is the last
//! rebalance date on or before `t`; its estimation window stops strictly before `τ`.

use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::s;
use rayon::prelude::*;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::solver::RiskBudgetSolver;
use super::types::FailurePolicy;
use super::types::PeriodKey;
use super::types::RebalanceFrequency;
use super::types::RiskBudget;
use super::types::SolverOutcome;
use crate::data::ReturnSeries;
use crate::error::RiskBudgetError;

/// Runtime configuration for [`RebalancingSimulator`].
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
  /// First date of the simulation horizon.
  pub start_date: NaiveDate,
  pub frequency: RebalanceFrequency,
  pub failure_policy: FailurePolicy,
  /// Minimum observations in an estimation window; `None` means `n_assets + 1`.
  pub min_history: Option<usize>,
  /// Solve all rebalance windows on the rayon pool before assembling the run.
  pub parallel: bool,
}

impl Default for SimulatorConfig {
  fn default() -> Self {
    Self {
      start_date: NaiveDate::from_ymd_opt(2005, 1, 3).unwrap_or(NaiveDate::MIN),
      frequency: RebalanceFrequency::Monthly,
      failure_policy: FailurePolicy::Fallback,
      min_history: None,
      parallel: false,
    }
  }
}

/// State carried from one simulation date to the next.
#[derive(Clone, Debug, Default)]
pub struct RebalanceState {
  last_rebalance_period: Option<PeriodKey>,
  last_weights: Option<Array1<f64>>,
}

impl RebalanceState {
  /// A rebalance is due whenever `period` differs from the last rebalance period.
  /// The very first date always qualifies.
  pub fn needs_rebalance(&self, period: PeriodKey) -> bool {
    self.last_rebalance_period != Some(period)
  }

  pub fn last_weights(&self) -> Option<&Array1<f64>> {
    self.last_weights.as_ref()
  }

  fn rebalanced(&mut self, period: PeriodKey, weights: Array1<f64>) {
    self.last_rebalance_period = Some(period);
    self.last_weights = Some(weights);
  }
}

/// Where the weights of a rebalance date came from.
#[derive(Clone, Debug, PartialEq)]
pub enum RebalanceSource {
  /// Fresh solver output.
  Solved { iterations: u64, objective: f64 },
  /// Solver failed; previous (or equal) weights were kept.
  FellBack { reason: String },
}

/// Audit record of one rebalance.
#[derive(Clone, Debug, PartialEq)]
pub struct RebalanceEvent {
  pub date: NaiveDate,
  /// Number of observations in the estimation window.
  pub window_len: usize,
  pub source: RebalanceSource,
}

/// Weight matrix and return series of a simulation, aligned on `dates`.
#[derive(Clone, Debug)]
pub struct SimulationOutput {
  pub dates: Vec<NaiveDate>,
  pub assets: Vec<String>,
  /// One row per date, one column per asset.
  pub weights: Array2<f64>,
  pub portfolio_returns: Array1<f64>,
  pub benchmark_returns: Array1<f64>,
  pub rebalances: Vec<RebalanceEvent>,
}

impl SimulationOutput {
  pub fn fallback_count(&self) -> usize {
    self
      .rebalances
      .iter()
      .filter(|e| matches!(e.source, RebalanceSource::FellBack { .. }))
      .count()
  }
}

/// Indices (into `dates`) of every rebalance date from `start` onwards.
pub fn rebalance_schedule(
  dates: &[NaiveDate],
  start: usize,
  frequency: RebalanceFrequency,
) -> Vec<usize> {
  let mut last: Option<PeriodKey> = None;
  let mut out = Vec::new();
  for (idx, date) in dates.iter().enumerate().skip(start) {
    let period = frequency.period_of(*date);
    if last != Some(period) {
      last = Some(period);
      out.push(idx);
    }
  }
  out
}

/// Equal-weighted return of every row.
pub fn equal_weight_returns(values: ArrayView2<'_, f64>) -> Array1<f64> {
  let n = values.ncols().max(1) as f64;
  values.sum_axis(Axis(1)) / n
}

/// Drives a [`RiskBudgetSolver`] over a return series on a calendar schedule.
#[derive(Clone, Debug, Default)]
pub struct RebalancingSimulator {
  config: SimulatorConfig,
  solver: RiskBudgetSolver,
}

impl RebalancingSimulator {
  pub fn new(config: SimulatorConfig, solver: RiskBudgetSolver) -> Self {
    Self { config, solver }
  }

  pub fn config(&self) -> &SimulatorConfig {
    &self.config
  }

  /// Simulate the risk-budget portfolio and the equal-weight benchmark.
  pub fn run(
    &self,
    returns: &ReturnSeries,
    budget: &RiskBudget,
  ) -> Result<SimulationOutput, RiskBudgetError> {
    let n = returns.n_assets();
    if returns.is_empty() {
      return Err(RiskBudgetError::data("return series is empty"));
    }
    if budget.len() != n {
      return Err(RiskBudgetError::data(format!(
        "risk budget has {} entries for {n} assets",
        budget.len()
      )));
    }
    let start = returns
      .first_index_on_or_after(self.config.start_date)
      .ok_or_else(|| {
        RiskBudgetError::data(format!(
          "start date {} is after the last observation",
          self.config.start_date
        ))
      })?;
    let min_history = self.config.min_history.unwrap_or(n + 1);
    let dates = &returns.dates()[start..];

    info!(
      start = %dates[0],
      end = %dates[dates.len() - 1],
      n_dates = dates.len(),
      n_assets = n,
      frequency = %self.config.frequency,
      "running rebalancing simulation"
    );

    let mut precomputed: HashMap<usize, Result<SolverOutcome, RiskBudgetError>> =
      if self.config.parallel {
        rebalance_schedule(returns.dates(), start, self.config.frequency)
          .into_par_iter()
          .map(|idx| (idx, self.solve_window(returns, budget, idx, min_history)))
          .collect()
      } else {
        HashMap::new()
      };

    let mut state = RebalanceState::default();
    let mut weights = Array2::<f64>::zeros((dates.len(), n));
    let mut portfolio_returns = Array1::<f64>::zeros(dates.len());
    let mut rebalances = Vec::new();

    for (row, idx) in (start..returns.len()).enumerate() {
      let date = returns.dates()[idx];
      let period = self.config.frequency.period_of(date);

      if state.needs_rebalance(period) {
        let solved = precomputed
          .remove(&idx)
          .unwrap_or_else(|| self.solve_window(returns, budget, idx, min_history));
        let (w, event) = self.resolve(date, idx, solved, &state, n)?;
        debug!(%date, window = event.window_len, weights = ?w.as_slice(), "rebalanced");
        rebalances.push(event);
        state.rebalanced(period, w);
      }

      let Some(w) = state.last_weights() else {
        return Err(RiskBudgetError::Degenerate(format!(
          "no weights available at {date}"
        )));
      };
      weights.row_mut(row).assign(w);
      portfolio_returns[row] = w.dot(&returns.row(idx));
    }

    let benchmark_returns = equal_weight_returns(returns.values().slice(s![start.., ..]));
    let output = SimulationOutput {
      dates: dates.to_vec(),
      assets: returns.assets().to_vec(),
      weights,
      portfolio_returns,
      benchmark_returns,
      rebalances,
    };

    info!(
      rebalances = output.rebalances.len(),
      fallbacks = output.fallback_count(),
      "simulation finished"
    );
    Ok(output)
  }

  fn solve_window(
    &self,
    returns: &ReturnSeries,
    budget: &RiskBudget,
    idx: usize,
    min_history: usize,
  ) -> Result<SolverOutcome, RiskBudgetError> {
    let window = returns.history_before(idx);
    if window.nrows() < min_history {
      return Err(RiskBudgetError::optimization(
        window.nrows(),
        format!("need at least {min_history} observations"),
      ));
    }
    self.solver.solve(window, budget)
  }

  fn resolve(
    &self,
    date: NaiveDate,
    window_len: usize,
    solved: Result<SolverOutcome, RiskBudgetError>,
    state: &RebalanceState,
    n: usize,
  ) -> Result<(Array1<f64>, RebalanceEvent), RiskBudgetError> {
    let reason = match solved {
      Ok(out) if out.success => {
        let event = RebalanceEvent {
          date,
          window_len,
          source: RebalanceSource::Solved {
            iterations: out.iterations,
            objective: out.objective,
          },
        };
        return Ok((out.weights, event));
      }
      Ok(out) => out.message,
      Err(RiskBudgetError::Optimization { reason, .. }) => reason,
      Err(other) => other.to_string(),
    };

    match self.config.failure_policy {
      FailurePolicy::Abort => Err(RiskBudgetError::optimization(window_len, reason).at_date(date)),
      FailurePolicy::Fallback => {
        let w = state
          .last_weights()
          .cloned()
          .unwrap_or_else(|| Array1::from_elem(n, 1.0 / n as f64));
        warn!(
          %date,
          window = window_len,
          %reason,
          "rebalance failed, falling back to previous weights"
        );
        Ok((
          w,
          RebalanceEvent {
            date,
            window_len,
            source: RebalanceSource::FellBack { reason },
          },
        ))
      }
    }
  }
}
