//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Risk-budget weight solving, calendar rebalancing and performance accounting.

pub mod covariance;
pub mod engine;
pub mod performance;
pub mod rebalance;
pub mod solver;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use covariance::portfolio_variance;
pub use covariance::risk_contributions;
pub use covariance::sample_covariance;
pub use engine::Backtest;
pub use engine::BacktestConfig;
pub use engine::BacktestReport;
pub use performance::PerformanceSummary;
pub use performance::cumulative_returns;
pub use performance::period_returns;
pub use performance::summary_table;
pub use rebalance::RebalanceEvent;
pub use rebalance::RebalanceSource;
pub use rebalance::RebalanceState;
pub use rebalance::RebalancingSimulator;
pub use rebalance::SimulationOutput;
pub use rebalance::SimulatorConfig;
pub use rebalance::equal_weight_returns;
pub use rebalance::rebalance_schedule;
pub use solver::RiskBudgetSolver;
pub use solver::SolverConfig;
pub use types::FailurePolicy;
pub use types::PeriodKey;
pub use types::RebalanceFrequency;
pub use types::RiskBudget;
pub use types::SolverOutcome;
