//! The two model interfaces: one-step regressors and horizon forecasters.

use crate::core::{Forecast, Series};
use crate::error::Result;

/// A one-step model mapping a feature row to a single value.
///
/// Feature rows are laid out as produced by
/// [`LaggedFeaturePanel::supervised`](crate::features::LaggedFeaturePanel::supervised).
pub trait Regressor: Send + Sync {
    /// Fit on row-major `features` and matching `target` values.
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()>;

    /// Predict one row.
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    /// Predict many rows.
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool;
}

/// A model fitted on a whole series that forecasts a horizon directly.
///
/// This trait is object-safe and can be used with `Box<dyn Forecaster>`.
pub trait Forecaster: Send {
    /// Fit the model to a monthly series.
    fn fit(&mut self, series: &Series) -> Result<()>;

    /// Forecast `horizon` months after the last observed month.
    fn predict(&self, horizon: usize) -> Result<Forecast>;

    /// In-sample one-step predictions aligned with the training series;
    /// `NaN` where no prediction exists.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// `actual - fitted`, aligned like [`fitted_values`](Self::fitted_values).
    fn residuals(&self) -> Option<&[f64]>;

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
pub type BoxedForecaster = Box<dyn Forecaster>;
