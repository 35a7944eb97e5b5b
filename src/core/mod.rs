//! Core data structures: month keys, series, panels and forecast tables.

mod forecast;
mod month;
mod series;

pub use forecast::{CombinedForecast, Forecast, ForecastRow, ForecastTable, ModelFamily};
pub use month::{is_contiguous, YearMonth};
pub use series::{Panel, Series};
