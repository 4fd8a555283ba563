//! # risk-budget
//!
//! $$
//! \min_{\mathbf{w}} \sum_i \left(\frac{w_i(\Sigma\mathbf{w})_i}{\mathbf{w}^\top\Sigma\mathbf{w}} - b_i\right)^2
//! \quad \text{s.t.}\ \mathbf{1}^\top\mathbf{w}=1,\ \mathbf{w}\ge 0
//! $$
//!
//! Risk-budgeted portfolio construction with monthly rebalancing, compared against an
//! equal-weighted benchmark.

pub mod data;
pub mod error;
pub mod portfolio;
pub mod visualization;

pub use data::DatedTable;
pub use data::ReturnSeries;
pub use error::RiskBudgetError;
pub use portfolio::Backtest;
pub use portfolio::BacktestConfig;
pub use portfolio::RebalancingSimulator;
pub use portfolio::RiskBudget;
pub use portfolio::RiskBudgetSolver;
