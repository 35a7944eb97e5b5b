//! Baseline forecasting models.

mod seasonal_naive;

pub use seasonal_naive::{seasonal_naive_values, SeasonalNaive};
