//! # Visualization
//!
//! $$
//! \{(t, C_t^{(k)})\}_{k=1}^m \mapsto \text{line chart on a shared date axis}
//! $$
//!
//! Cumulative-return line charts rendered with plotly.

use std::path::Path;

use chrono::NaiveDate;
use plotly::Layout;
use plotly::Plot;
use plotly::Scatter;
use plotly::common::DashType;
use plotly::common::Line;
use plotly::common::Mode;
use plotly::layout::Axis;
use plotly::layout::Margin;

use crate::error::RiskBudgetError;

const LINE_WIDTH: f64 = 1.5;

struct NamedSeries {
  label: String,
  values: Vec<f64>,
}

/// Line chart of cumulative growth curves, one trace per strategy.
pub struct CumulativeReturnPlot {
  series: Vec<NamedSeries>,
  title: String,
}

impl Default for CumulativeReturnPlot {
  fn default() -> Self {
    Self::new()
  }
}

impl CumulativeReturnPlot {
  pub fn new() -> Self {
    Self {
      series: Vec::new(),
      title: String::new(),
    }
  }

  pub fn title(mut self, title: &str) -> Self {
    self.title = title.into();
    self
  }

  pub fn series(mut self, label: &str, values: Vec<f64>) -> Self {
    self.series.push(NamedSeries {
      label: label.into(),
      values,
    });
    self
  }

  /// Build the chart. Every series must have one value per date.
  pub fn plot(&self, dates: &[NaiveDate]) -> Result<Plot, RiskBudgetError> {
    if let Some(bad) = self.series.iter().find(|s| s.values.len() != dates.len()) {
      return Err(RiskBudgetError::data(format!(
        "series '{}' has {} points for {} dates",
        bad.label,
        bad.values.len(),
        dates.len()
      )));
    }

    let x: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

    let mut plot = Plot::new();
    plot.set_layout(
      Layout::new()
        .title(self.title.as_str())
        .auto_size(true)
        .margin(Margin::new().left(56).right(24).top(64).bottom(44))
        .x_axis(Axis::new().title("Date"))
        .y_axis(Axis::new().title("Cumulative return")),
    );

    for (idx, s) in self.series.iter().enumerate() {
      let dash = match idx % 3 {
        0 => DashType::Solid,
        1 => DashType::Dash,
        _ => DashType::Dot,
      };
      let trace = Scatter::new(x.clone(), s.values.clone())
        .mode(Mode::Lines)
        .line(Line::new().width(LINE_WIDTH).dash(dash))
        .name(s.label.as_str());
      plot.add_trace(trace);
    }

    Ok(plot)
  }

  /// Write the chart as a standalone HTML page.
  pub fn write_html(
    &self,
    dates: &[NaiveDate],
    path: impl AsRef<Path>,
  ) -> Result<(), RiskBudgetError> {
    self.plot(dates)?.write_html(path);
    Ok(())
  }

  /// Open the chart in the default browser.
  pub fn show(&self, dates: &[NaiveDate]) -> Result<(), RiskBudgetError> {
    self.plot(dates)?.show();
    Ok(())
  }
}
