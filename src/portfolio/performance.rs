//! # Performance
//!
//! $$
//! C_k = \prod_{i=1}^{k}(1+r_i),\qquad
//! \mathrm{MDD} = \max_k\left(1-\frac{C_k}{\max_{j\le k} C_j}\right)
//! $$
//!
//! Cumulative growth curves and summary statistics of a return series.

use prettytable::Table;
use prettytable::row;

/// Growth of one unit invested: `c_k = ∏_{i≤k}(1 + r_i)`.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
  returns
    .iter()
    .scan(1.0, |acc, r| {
      *acc *= 1.0 + r;
      Some(*acc)
    })
    .collect()
}

/// Recover per-period returns from a cumulative curve that started at 1.
pub fn period_returns(cumulative: &[f64]) -> Vec<f64> {
  let mut prev = 1.0;
  cumulative
    .iter()
    .map(|&c| {
      let r = c / prev - 1.0;
      prev = c;
      r
    })
    .collect()
}

fn max_drawdown(cumulative: &[f64]) -> f64 {
  let mut peak = 1.0_f64;
  let mut mdd = 0.0_f64;
  for &c in cumulative {
    peak = peak.max(c);
    mdd = mdd.max(1.0 - c / peak);
  }
  mdd
}

/// Headline statistics of a daily excess-return series.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceSummary {
  pub total_return: f64,
  /// Geometric annualized return.
  pub annualized_return: f64,
  pub annualized_volatility: f64,
  pub sharpe: f64,
  pub max_drawdown: f64,
}

impl PerformanceSummary {
  pub fn from_returns(returns: &[f64], periods_per_year: f64) -> Self {
    let n = returns.len();
    if n == 0 {
      return Self::default();
    }

    let cumulative = cumulative_returns(returns);
    let terminal = cumulative[n - 1];
    let years = n as f64 / periods_per_year;
    let annualized_return = if terminal > 0.0 {
      terminal.powf(1.0 / years) - 1.0
    } else {
      -1.0
    };

    let mean = returns.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
      (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
      0.0
    };
    let sharpe = if std > 1e-15 {
      mean / std * periods_per_year.sqrt()
    } else {
      0.0
    };

    Self {
      total_return: terminal - 1.0,
      annualized_return,
      annualized_volatility: std * periods_per_year.sqrt(),
      sharpe,
      max_drawdown: max_drawdown(&cumulative),
    }
  }
}

/// Side-by-side table of named summaries.
pub fn summary_table(rows: &[(&str, PerformanceSummary)]) -> Table {
  let mut table = Table::new();
  table.set_titles(row![
    "Portfolio",
    "Total",
    "Ann. return",
    "Ann. vol",
    "Sharpe",
    "Max DD"
  ]);
  for (name, s) in rows {
    table.add_row(row![
      name,
      format!("{:.2}%", s.total_return * 100.0),
      format!("{:.2}%", s.annualized_return * 100.0),
      format!("{:.2}%", s.annualized_volatility * 100.0),
      format!("{:.3}", s.sharpe),
      format!("{:.2}%", s.max_drawdown * 100.0)
    ]);
  }
  table
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn cumulative_is_running_product() {
    let r = [0.1, -0.05, 0.02];
    let c = cumulative_returns(&r);

    assert_abs_diff_eq!(c[0], 1.1, epsilon = 1e-12);
    assert_abs_diff_eq!(c[1], 1.1 * 0.95, epsilon = 1e-12);
    assert_abs_diff_eq!(c[2], 1.1 * 0.95 * 1.02, epsilon = 1e-12);
  }

  #[test]
  fn period_returns_invert_cumulative_curve() {
    let r = [0.013, -0.021, 0.0, 0.007, -0.002, 0.031];
    let back = period_returns(&cumulative_returns(&r));

    for (a, b) in r.iter().zip(back.iter()) {
      assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
  }

  #[test]
  fn drawdown_measures_peak_to_trough() {
    let r = [0.10, -0.20, 0.05, 0.30];
    let s = PerformanceSummary::from_returns(&r, 252.0);

    assert_abs_diff_eq!(s.max_drawdown, 0.20, epsilon = 1e-12);
    assert_abs_diff_eq!(s.total_return, 1.1 * 0.8 * 1.05 * 1.3 - 1.0, epsilon = 1e-12);
  }

  #[test]
  fn flat_series_has_zero_sharpe() {
    let s = PerformanceSummary::from_returns(&[0.0; 10], 252.0);

    assert_eq!(s.sharpe, 0.0);
    assert_eq!(s.annualized_volatility, 0.0);
    assert_eq!(s.max_drawdown, 0.0);
  }

  #[test]
  fn empty_series_is_all_zero() {
    assert_eq!(
      PerformanceSummary::from_returns(&[], 252.0),
      PerformanceSummary::default()
    );
  }

  #[test]
  fn table_has_one_row_per_portfolio() {
    let s = PerformanceSummary::from_returns(&[0.01, -0.01, 0.02], 252.0);
    let table = summary_table(&[("Risk Parity", s), ("Equal Weighted", s)]);

    assert_eq!(table.len(), 2);
  }
}
