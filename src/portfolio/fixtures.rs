//! Synthetic return panels shared by the portfolio tests.

use chrono::Datelike;
use chrono::NaiveDate;
use chrono::Weekday;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;

use crate::data::ReturnSeries;

/// `n` consecutive weekdays starting at `from`.
pub(crate) fn business_days(from: NaiveDate, n: usize) -> Vec<NaiveDate> {
  from
    .iter_days()
    .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
    .take(n)
    .collect()
}

/// Gaussian returns with per-asset volatilities, seeded for reproducibility.
pub(crate) fn gaussian_returns(
  from: NaiveDate,
  n_days: usize,
  vols: &[f64],
  seed: u64,
) -> ReturnSeries {
  let mut rng = StdRng::seed_from_u64(seed);
  let dists: Vec<Normal<f64>> = vols
    .iter()
    .map(|&v| Normal::new(0.0002, v).unwrap())
    .collect();
  let values = Array2::from_shape_fn((n_days, vols.len()), |(_, j)| dists[j].sample(&mut rng));
  let assets = (0..vols.len()).map(|j| format!("asset_{j}")).collect();

  ReturnSeries::new(business_days(from, n_days), assets, values).unwrap()
}

pub(crate) fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One-factor panel `r_tj = beta_j f_t + e_tj` with dispersed betas and idiosyncratic vols.
pub(crate) fn factor_returns(n_obs: usize, n_assets: usize, seed: u64) -> Array2<f64> {
  let mut rng = StdRng::seed_from_u64(seed);
  let market = Normal::new(0.0003, 0.01).unwrap();
  let idio: Vec<Normal<f64>> = (0..n_assets)
    .map(|j| Normal::new(0.0, 0.004 + 0.004 * (j % 5) as f64).unwrap())
    .collect();
  let betas: Vec<f64> = (0..n_assets)
    .map(|j| 0.4 + 1.2 * j as f64 / n_assets as f64)
    .collect();

  let mut values = Array2::zeros((n_obs, n_assets));
  for mut row in values.rows_mut() {
    let f = market.sample(&mut rng);
    for (j, r) in row.iter_mut().enumerate() {
      *r = betas[j] * f + idio[j].sample(&mut rng);
    }
  }
  values
}
