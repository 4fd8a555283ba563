use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use risk_budget::Backtest;
use risk_budget::BacktestConfig;
use risk_budget::portfolio::FailurePolicy;
use risk_budget::portfolio::RebalanceFrequency;
use risk_budget::portfolio::SimulatorConfig;
use risk_budget::portfolio::SolverConfig;

#[derive(Parser)]
#[command(name = "risk-budget")]
#[command(about = "Risk-budgeted portfolio vs equal weighting", long_about = None)]
struct Cli {
  /// CSV of asset price levels (date column first)
  #[arg(long, default_value = "data/prices.csv")]
  prices: PathBuf,

  /// CSV with one annualized risk-free rate column
  #[arg(long = "risk-free", default_value = "data/risk_free.csv")]
  risk_free: PathBuf,

  /// Descriptor rows under each CSV header to drop
  #[arg(long, default_value_t = 0)]
  skip_rows: usize,

  /// First simulation date (YYYY-MM-DD)
  #[arg(long, default_value = "2005-01-03")]
  start_date: NaiveDate,

  /// Rebalancing frequency (monthly | quarterly | yearly)
  #[arg(long, default_value = "monthly")]
  frequency: RebalanceFrequency,

  /// Comma-separated risk budget; equal risk when omitted
  #[arg(long, value_delimiter = ',')]
  budget: Option<Vec<f64>>,

  /// What to do when a rebalance cannot be solved (fallback | abort)
  #[arg(long, default_value = "fallback")]
  policy: FailurePolicy,

  /// Solve rebalance windows in parallel
  #[arg(long, default_value_t = false)]
  parallel: bool,

  /// Output HTML chart
  #[arg(long, default_value = "risk_parity.html")]
  output: PathBuf,

  /// Also open the chart in a browser
  #[arg(long, default_value_t = false)]
  show: bool,
}

fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .init();
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  let backtest = Backtest::new(BacktestConfig {
    prices_path: cli.prices,
    risk_free_path: cli.risk_free,
    skip_rows: cli.skip_rows,
    risk_budget: cli.budget,
    simulator: SimulatorConfig {
      start_date: cli.start_date,
      frequency: cli.frequency,
      failure_policy: cli.policy,
      parallel: cli.parallel,
      ..SimulatorConfig::default()
    },
    solver: SolverConfig::default(),
    ..BacktestConfig::default()
  });

  let report = backtest.run().context("backtest aborted")?;
  report.summary_table().printstd();

  report
    .write_html(&cli.output)
    .context("cannot write chart")?;
  tracing::info!(path = %cli.output.display(), "wrote cumulative return chart");
  if cli.show {
    report.show().context("cannot show chart")?;
  }

  Ok(())
}
