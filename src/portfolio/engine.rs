//! # Backtest Engine
//!
//! $$
//! P,\ r^f \;\longrightarrow\; r \;\longrightarrow\; \{\mathbf{w}_t\} \;\longrightarrow\; (C^{rb}_t,\ C^{ew}_t)
//! $$
//!
//! End-to-end pipeline: load price and risk-free tables, build excess returns, run the
//! rebalancing simulation and summarize both portfolios.

use std::path::Path;
use std::path::PathBuf;

use plotly::Plot;
use prettytable::Table;
use tracing::info;

use super::performance::PerformanceSummary;
use super::performance::cumulative_returns;
use super::performance::summary_table;
use super::rebalance::RebalancingSimulator;
use super::rebalance::SimulationOutput;
use super::rebalance::SimulatorConfig;
use super::solver::RiskBudgetSolver;
use super::solver::SolverConfig;
use super::types::RiskBudget;
use crate::data::DatedTable;
use crate::data::ReturnSeries;
use crate::data::excess_log_returns;
use crate::data::load_table;
use crate::data::returns::TRADING_DAYS;
use crate::error::RiskBudgetError;
use crate::visualization::CumulativeReturnPlot;

pub const RISK_PARITY_LABEL: &str = "Risk Parity";
pub const EQUAL_WEIGHT_LABEL: &str = "Equal Weighted";

/// Runtime configuration for [`Backtest`].
#[derive(Clone, Debug)]
pub struct BacktestConfig {
  /// CSV of asset price levels, one column per asset.
  pub prices_path: PathBuf,
  /// CSV with a single annualized risk-free rate column.
  pub risk_free_path: PathBuf,
  /// Descriptor rows under the CSV header to drop.
  pub skip_rows: usize,
  pub periods_per_year: f64,
  /// Target risk shares; equal risk budget when `None`.
  pub risk_budget: Option<Vec<f64>>,
  pub simulator: SimulatorConfig,
  pub solver: SolverConfig,
}

impl Default for BacktestConfig {
  fn default() -> Self {
    Self {
      prices_path: PathBuf::from("data/prices.csv"),
      risk_free_path: PathBuf::from("data/risk_free.csv"),
      skip_rows: 0,
      periods_per_year: TRADING_DAYS,
      risk_budget: None,
      simulator: SimulatorConfig::default(),
      solver: SolverConfig::default(),
    }
  }
}

/// Result of a full backtest.
#[derive(Clone, Debug)]
pub struct BacktestReport {
  pub simulation: SimulationOutput,
  pub risk_parity_cumulative: Vec<f64>,
  pub equal_weight_cumulative: Vec<f64>,
  pub risk_parity_summary: PerformanceSummary,
  pub equal_weight_summary: PerformanceSummary,
}

impl BacktestReport {
  pub fn summary_table(&self) -> Table {
    summary_table(&[
      (RISK_PARITY_LABEL, self.risk_parity_summary),
      (EQUAL_WEIGHT_LABEL, self.equal_weight_summary),
    ])
  }

  /// Cumulative growth of both portfolios on a shared date axis.
  pub fn chart(&self) -> CumulativeReturnPlot {
    CumulativeReturnPlot::new()
      .title("Risk budgeting vs equal weighting")
      .series(RISK_PARITY_LABEL, self.risk_parity_cumulative.clone())
      .series(EQUAL_WEIGHT_LABEL, self.equal_weight_cumulative.clone())
  }

  pub fn plot(&self) -> Result<Plot, RiskBudgetError> {
    self.chart().plot(&self.simulation.dates)
  }

  pub fn write_html(&self, path: impl AsRef<Path>) -> Result<(), RiskBudgetError> {
    self.chart().write_html(&self.simulation.dates, path)
  }

  pub fn show(&self) -> Result<(), RiskBudgetError> {
    self.chart().show(&self.simulation.dates)
  }
}

/// Single entry point for the risk-budget backtest.
#[derive(Clone, Debug, Default)]
pub struct Backtest {
  config: BacktestConfig,
}

impl Backtest {
  pub fn new(config: BacktestConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &BacktestConfig {
    &self.config
  }

  /// Load both tables from disk and run.
  pub fn run(&self) -> Result<BacktestReport, RiskBudgetError> {
    let prices = load_table(&self.config.prices_path, self.config.skip_rows)?;
    let risk_free = load_table(&self.config.risk_free_path, self.config.skip_rows)?;
    info!(
      assets = prices.columns().len(),
      observations = prices.len(),
      "loaded input tables"
    );
    self.run_tables(&prices, &risk_free)
  }

  /// Run on in-memory price and risk-free tables.
  pub fn run_tables(
    &self,
    prices: &DatedTable,
    risk_free: &DatedTable,
  ) -> Result<BacktestReport, RiskBudgetError> {
    let returns = excess_log_returns(prices, risk_free, self.config.periods_per_year)?;
    self.run_returns(&returns)
  }

  /// Run on a ready-made excess return series.
  pub fn run_returns(&self, returns: &ReturnSeries) -> Result<BacktestReport, RiskBudgetError> {
    let budget = match &self.config.risk_budget {
      Some(shares) => RiskBudget::new(shares.clone())?,
      None => RiskBudget::equal(returns.n_assets()),
    };

    let simulator = RebalancingSimulator::new(
      self.config.simulator.clone(),
      RiskBudgetSolver::new(self.config.solver),
    );
    let simulation = simulator.run(returns, &budget)?;

    let rp = simulation.portfolio_returns.to_vec();
    let ew = simulation.benchmark_returns.to_vec();

    Ok(BacktestReport {
      risk_parity_cumulative: cumulative_returns(&rp),
      equal_weight_cumulative: cumulative_returns(&ew),
      risk_parity_summary: PerformanceSummary::from_returns(&rp, self.config.periods_per_year),
      equal_weight_summary: PerformanceSummary::from_returns(&ew, self.config.periods_per_year),
      simulation,
    })
  }
}
