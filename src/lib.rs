//! # macrocast
//!
//! Multi-model monthly forecasting for macroeconomic and energy series.
//!
//! For each target series the [`ForecastOrchestrator`](forecast::ForecastOrchestrator)
//! decomposes the series, fits five model families (linear regression on lags,
//! seasonal naive, gradient-boosted residuals, SARIMA and a SARIMA +
//! boosted-residual hybrid) and assembles their forecasts into one table
//! keyed by calendar month. Stationarity diagnostics are available through
//! [`validation::StationarityAnalyzer`].

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod config;
pub mod core;
pub mod error;
pub mod features;
pub mod forecast;
pub mod io;
pub mod models;
pub mod seasonality;
pub mod utils;
pub mod validation;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::config::{BoosterSearchConfig, ForecastConfig, SeriesModelConfig, Trend};
    pub use crate::core::{
        CombinedForecast, Forecast, ForecastTable, ModelFamily, Panel, Series, YearMonth,
    };
    pub use crate::error::{ForecastError, Result};
    pub use crate::features::{build_lags, LagSet};
    pub use crate::forecast::{ForecastOrchestrator, IterativeForecaster, LagForecaster};
    pub use crate::models::{Forecaster, Regressor};
    pub use crate::utils::{calculate_metrics, AccuracyMetrics};
}
