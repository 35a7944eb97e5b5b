//! Feature construction for the lag-based models.

pub mod lags;

pub use lags::{build_lags, LagColumn, LagSet, LaggedFeaturePanel};
