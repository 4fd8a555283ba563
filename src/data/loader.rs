//! # CSV Loader
//!
//! Reads a date-indexed numeric table. The first column holds the date, every other
//! column is one numeric series named by its header:
//!
//! ```text
//! date,value,momentum,carry
//! 2004-12-31,100.0,100.0,100.0
//! 2005-01-03,100.4,99.8,100.1
//! ```
//!
//! Cells are validated while reading, so a bad value is reported with its line and
//! column before any computation starts.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use csv::StringRecord;
use csv::Trim;
use ndarray::Array2;

use super::table::DatedTable;
use crate::error::RiskBudgetError;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
  DATE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn line_of(record: &StringRecord) -> u64 {
  record.position().map(|p| p.line()).unwrap_or(0)
}

/// Load a table from a CSV file, dropping `skip_rows` data rows under the header.
pub fn load_table(path: impl AsRef<Path>, skip_rows: usize) -> Result<DatedTable, RiskBudgetError> {
  let path = path.as_ref();
  let file = File::open(path)
    .map_err(|e| RiskBudgetError::data(format!("cannot open {}: {e}", path.display())))?;
  read_table(file, skip_rows)
    .map_err(|e| RiskBudgetError::data(format!("{}: {}", path.display(), strip_prefix(e))))
}

fn strip_prefix(err: RiskBudgetError) -> String {
  match err {
    RiskBudgetError::Data(msg) => msg,
    other => other.to_string(),
  }
}

/// Parse a table from any CSV reader.
pub fn read_table<R: Read>(reader: R, skip_rows: usize) -> Result<DatedTable, RiskBudgetError> {
  let mut rdr = ReaderBuilder::new()
    .has_headers(true)
    .trim(Trim::All)
    .from_reader(reader);

  let headers = rdr
    .headers()
    .map_err(|e| RiskBudgetError::data(format!("unreadable header: {e}")))?
    .clone();
  if headers.len() < 2 {
    return Err(RiskBudgetError::data(
      "expected a date column followed by at least one value column",
    ));
  }
  let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

  let mut dates = Vec::new();
  let mut cells = Vec::new();

  for record in rdr.records().skip(skip_rows) {
    let record = record.map_err(|e| {
      let line = e.position().map(|p| p.line()).unwrap_or(0);
      RiskBudgetError::data(format!("line {line}: {e}"))
    })?;
    let line = line_of(&record);

    if record.iter().all(str::is_empty) {
      continue;
    }

    let raw_date = record.get(0).unwrap_or_default();
    let date = parse_date(raw_date)
      .ok_or_else(|| RiskBudgetError::data(format!("line {line}: unparsable date '{raw_date}'")))?;

    for (col, name) in columns.iter().enumerate() {
      let raw = record.get(col + 1).unwrap_or_default();
      let value: f64 = raw.parse().map_err(|_| {
        RiskBudgetError::data(format!(
          "line {line}: non-numeric value '{raw}' in column '{name}'"
        ))
      })?;
      cells.push(value);
    }
    dates.push(date);
  }

  if dates.is_empty() {
    return Err(RiskBudgetError::data("no data rows"));
  }

  let values = Array2::from_shape_vec((dates.len(), columns.len()), cells)
    .map_err(|e| RiskBudgetError::data(e.to_string()))?;
  DatedTable::new(dates, columns, values)
}
