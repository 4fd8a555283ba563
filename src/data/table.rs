//! # Dated Tables
//!
//! $$
//! X \in \mathbb{R}^{T \times N},\quad t_1 < t_2 < \dots < t_T
//! $$
//!
//! Validated date-indexed numeric tables and the excess return series built on them.

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::s;

use crate::error::RiskBudgetError;

/// Numeric table with one row per date and one column per named series.
#[derive(Clone, Debug, PartialEq)]
pub struct DatedTable {
  dates: Vec<NaiveDate>,
  columns: Vec<String>,
  values: Array2<f64>,
}

impl DatedTable {
  /// Build a table, rejecting shape mismatches, unordered dates and non-finite cells.
  pub fn new(
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Array2<f64>,
  ) -> Result<Self, RiskBudgetError> {
    if values.nrows() != dates.len() {
      return Err(RiskBudgetError::data(format!(
        "{} dates for {} rows",
        dates.len(),
        values.nrows()
      )));
    }
    if values.ncols() != columns.len() {
      return Err(RiskBudgetError::data(format!(
        "{} column names for {} columns",
        columns.len(),
        values.ncols()
      )));
    }
    if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
      return Err(RiskBudgetError::data(format!(
        "dates must be strictly increasing ({} followed by {})",
        pair[0], pair[1]
      )));
    }
    for ((row, col), v) in values.indexed_iter() {
      if !v.is_finite() {
        return Err(RiskBudgetError::data(format!(
          "non-finite value {v} at {} in column '{}'",
          dates[row], columns[col]
        )));
      }
    }

    Ok(Self {
      dates,
      columns,
      values,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn columns(&self) -> &[String] {
    &self.columns
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }
}

/// Daily excess returns, one column per asset, on a shared date index.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSeries {
  table: DatedTable,
}

impl ReturnSeries {
  pub fn new(
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    values: Array2<f64>,
  ) -> Result<Self, RiskBudgetError> {
    Ok(Self {
      table: DatedTable::new(dates, assets, values)?,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    self.table.dates()
  }

  pub fn assets(&self) -> &[String] {
    self.table.columns()
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.table.values()
  }

  pub fn n_assets(&self) -> usize {
    self.table.columns.len()
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  /// Asset returns observed at row `idx`.
  pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
    self.table.values.row(idx)
  }

  /// Every observation strictly before row `idx`.
  pub fn history_before(&self, idx: usize) -> ArrayView2<'_, f64> {
    let end = idx.min(self.len());
    self.table.values.slice(s![..end, ..])
  }

  /// Index of the first date on or after `date`, if any.
  pub fn first_index_on_or_after(&self, date: NaiveDate) -> Option<usize> {
    let idx = self.dates().partition_point(|d| *d < date);
    (idx < self.len()).then_some(idx)
  }
}

impl From<ReturnSeries> for DatedTable {
  fn from(series: ReturnSeries) -> Self {
    series.table
  }
}
