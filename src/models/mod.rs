//! Forecasting models.
//!
//! One-step models implement [`Regressor`] and are rolled forward by
//! [`LagForecaster`](crate::forecast::LagForecaster); horizon models
//! implement [`Forecaster`] directly.

mod traits;

pub mod arima;
pub mod baseline;
pub mod boosting;
pub mod hybrid;
pub mod linear;

pub use arima::{Sarima, SarimaCoefficients, SarimaSpec};
pub use baseline::{seasonal_naive_values, SeasonalNaive};
pub use boosting::{BoosterParams, BoosterSearch, GradientBoostedRegressor, TunedBooster};
pub use hybrid::HybridSarimaBooster;
pub use linear::LinearLagRegressor;
pub use traits::{BoxedForecaster, Forecaster, Regressor};
