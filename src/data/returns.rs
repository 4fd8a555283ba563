//! # Excess Returns
//!
//! $$
//! r_{i,t} = \ln P_{i,t} - \ln P_{i,t-1} - \frac{r^f_t}{K}
//! $$
//!
//! `K` is the number of periods per year used to de-annualize the risk-free rate.

use ndarray::Array2;
use ndarray::Zip;
use ndarray::s;

use super::table::DatedTable;
use super::table::ReturnSeries;
use crate::error::RiskBudgetError;

/// Trading days per year used to de-annualize the risk-free rate.
pub const TRADING_DAYS: f64 = 252.0;

/// Turn price levels and an annualized risk-free rate into excess log returns.
///
/// Both tables must share the same date index. The first observation has no return
/// and is dropped.
pub fn excess_log_returns(
  prices: &DatedTable,
  risk_free: &DatedTable,
  periods_per_year: f64,
) -> Result<ReturnSeries, RiskBudgetError> {
  if risk_free.columns().len() != 1 {
    return Err(RiskBudgetError::data(format!(
      "risk-free table must have exactly one column, found {}",
      risk_free.columns().len()
    )));
  }
  if prices.len() != risk_free.len() {
    return Err(RiskBudgetError::data(format!(
      "price table has {} dates but risk-free table has {}",
      prices.len(),
      risk_free.len()
    )));
  }
  if let Some((p, r)) = prices
    .dates()
    .iter()
    .zip(risk_free.dates())
    .find(|(p, r)| p != r)
  {
    return Err(RiskBudgetError::data(format!(
      "date index mismatch: price table has {p} where risk-free table has {r}"
    )));
  }
  if prices.len() < 2 {
    return Err(RiskBudgetError::data(
      "at least two price observations are needed to form a return",
    ));
  }
  if periods_per_year.is_nan() || periods_per_year <= 0.0 {
    return Err(RiskBudgetError::data("periods per year must be positive"));
  }

  let levels = prices.values();
  if let Some(((row, col), v)) = levels.indexed_iter().find(|(_, v)| **v <= 0.0) {
    return Err(RiskBudgetError::data(format!(
      "non-positive price {v} at {} in column '{}'",
      prices.dates()[row],
      prices.columns()[col]
    )));
  }

  let logs = levels.mapv(f64::ln);
  let rf = risk_free.values().column(0).slice(s![1..]).to_owned() / periods_per_year;

  let mut rets: Array2<f64> = &logs.slice(s![1.., ..]) - &logs.slice(s![..-1, ..]);
  Zip::from(rets.rows_mut())
    .and(&rf)
    .for_each(|mut row, &rf_t| row -= rf_t);

  ReturnSeries::new(
    prices.dates()[1..].to_vec(),
    prices.columns().to_vec(),
    rets,
  )
}
