//! # Data
//!
//! $$
//! r_t = \ln P_t - \ln P_{t-1} - \frac{r^f_t}{252}
//! $$
//!
//! Date-indexed tables, CSV loading and excess log-return construction.

pub mod loader;
pub mod returns;
pub mod table;

pub use loader::load_table;
pub use loader::read_table;
pub use returns::excess_log_returns;
pub use table::DatedTable;
pub use table::ReturnSeries;
