//! Recursive multi-step forecasting with one-step regressors.
//!
//! Lag values live in fixed-capacity ring buffers, one per source column.
//! Each step reads the feature row by lag position, predicts, and pushes the
//! prediction (and any known future covariate values) into the rings.

use crate::core::{Forecast, Panel, Series, YearMonth};
use crate::error::{ForecastError, Result};
use crate::features::{build_lags, LagSet};
use crate::models::{Forecaster, Regressor};
use std::collections::BTreeMap;
use tracing::debug;

/// Fixed-capacity ring buffer of the most recent values of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct LagRing {
    buf: Vec<f64>,
    /// Slot the next value is written to.
    head: usize,
    len: usize,
}

impl LagRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![f64::NAN; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// A full ring holding the last `capacity` values of `history`.
    pub fn from_history(history: &[f64], capacity: usize) -> Self {
        let mut ring = Self::new(capacity);
        let start = history.len().saturating_sub(ring.capacity());
        for &v in &history[start..] {
            ring.push(v);
        }
        ring
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append the newest value, overwriting the oldest when full.
    pub fn push(&mut self, value: f64) {
        self.buf[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        self.len = (self.len + 1).min(self.capacity());
    }

    /// The value `lag` steps back; `lag(1)` is the newest.
    pub fn lag(&self, lag: usize) -> Option<f64> {
        if lag == 0 || lag > self.len {
            return None;
        }
        let cap = self.capacity();
        Some(self.buf[(self.head + cap - lag) % cap])
    }
}

/// Lag rings for the target and its covariates, positioned at the last
/// observed month.
#[derive(Debug, Clone, PartialEq)]
pub struct LagState {
    names: Vec<String>,
    rings: Vec<LagRing>,
    target: usize,
    lags: LagSet,
    last_month: YearMonth,
}

impl LagState {
    /// Seed one ring per panel column from its most recent `lags.max()` values.
    ///
    /// Column order follows the panel, matching the layout produced by
    /// [`build_lags`].
    pub fn from_panel(panel: &Panel, target: &str, lags: &LagSet) -> Result<Self> {
        let depth = lags.max();
        let last_month = *panel.months().last().ok_or(ForecastError::EmptyData)?;
        if panel.nrows() < depth {
            return Err(ForecastError::InsufficientHistory {
                needed: depth,
                got: panel.nrows(),
            });
        }

        let mut names = Vec::with_capacity(panel.ncols());
        let mut rings = Vec::with_capacity(panel.ncols());
        for name in panel.column_names() {
            let values = panel.column(name)?;
            let tail = &values[values.len() - depth..];
            if tail.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::InvalidParameter(format!(
                    "column '{name}' has missing values among its last {depth} observations"
                )));
            }
            names.push(name.to_string());
            rings.push(LagRing::from_history(tail, depth));
        }
        let target = names
            .iter()
            .position(|n| n == target)
            .ok_or_else(|| ForecastError::MissingColumn(target.to_string()))?;

        Ok(Self {
            names,
            rings,
            target,
            lags: lags.clone(),
            last_month,
        })
    }

    pub fn last_month(&self) -> YearMonth {
        self.last_month
    }

    pub fn target(&self) -> &str {
        &self.names[self.target]
    }

    /// Source columns other than the target, in feature order.
    pub fn covariates(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.target)
            .map(|(_, n)| n.as_str())
    }

    /// Current feature row: per source, the lags ascending.
    pub fn feature_row(&self) -> Vec<f64> {
        self.rings
            .iter()
            .flat_map(|ring| self.lags.iter().map(move |l| ring.lag(l).unwrap_or(f64::NAN)))
            .collect()
    }

    fn advance(&mut self, prediction: f64, step: usize, future: &BTreeMap<String, Vec<f64>>) {
        for (i, ring) in self.rings.iter_mut().enumerate() {
            if i == self.target {
                ring.push(prediction);
            } else if let Some(values) = future.get(&self.names[i]) {
                ring.push(values[step]);
            }
        }
        self.last_month = self.last_month.succ();
    }
}

/// Rolls a one-step regressor forward over a horizon.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterativeForecaster;

impl IterativeForecaster {
    pub fn new() -> Self {
        Self
    }

    /// Forecast a target with no covariates.
    pub fn forecast<R: Regressor + ?Sized>(
        &self,
        model: &R,
        state: &LagState,
        horizon: usize,
    ) -> Result<Forecast> {
        self.forecast_with_covariates(model, state, horizon, &BTreeMap::new())
    }

    /// Forecast with known future values for every covariate in `state`.
    ///
    /// Each covariate needs at least `horizon` future values.
    pub fn forecast_with_covariates<R: Regressor + ?Sized>(
        &self,
        model: &R,
        state: &LagState,
        horizon: usize,
        future: &BTreeMap<String, Vec<f64>>,
    ) -> Result<Forecast> {
        for name in state.covariates() {
            let values = future
                .get(name)
                .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))?;
            if values.len() < horizon {
                return Err(ForecastError::DimensionMismatch {
                    expected: horizon,
                    got: values.len(),
                });
            }
        }

        let mut state = state.clone();
        let start = state.last_month();
        let mut values = Vec::with_capacity(horizon);
        for step in 0..horizon {
            let prediction = model.predict_row(&state.feature_row())?;
            if !prediction.is_finite() {
                return Err(ForecastError::ModelFit(format!(
                    "{} produced a non-finite prediction at step {}",
                    model.name(),
                    step + 1
                )));
            }
            values.push(prediction);
            state.advance(prediction, step, future);
        }
        debug!(model = model.name(), series = state.target(), horizon, "iterative rollout");
        Ok(Forecast::after(start, values))
    }
}

/// A [`Regressor`] on lagged features, rolled forward with [`IterativeForecaster`].
#[derive(Debug, Clone)]
pub struct LagForecaster<R> {
    regressor: R,
    lags: LagSet,
    state: Option<LagState>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
}

impl<R: Regressor> LagForecaster<R> {
    pub fn new(regressor: R, lags: LagSet) -> Self {
        Self {
            regressor,
            lags,
            state: None,
            fitted: None,
            residuals: None,
        }
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    pub fn lags(&self) -> &LagSet {
        &self.lags
    }

    /// Fit on lags of every panel column, predicting `target`.
    pub fn fit_panel(&mut self, panel: &Panel, target: &str) -> Result<()> {
        let lagged = build_lags(panel, &self.lags, false)?;
        let (x, y, _) = lagged.supervised(target)?;
        if x.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                needed: self.lags.max() + 1,
                got: panel.nrows(),
            });
        }
        self.regressor.fit(&x, &y)?;
        let predictions = self.regressor.predict(&x)?;

        // Align one-step predictions back onto the panel's months.
        let actual = panel.column(target)?;
        let mut fitted = vec![f64::NAN; panel.nrows()];
        let mut row = 0;
        for (i, month) in panel.months().iter().enumerate() {
            if lagged.months().get(row) == Some(month) {
                fitted[i] = predictions[row];
                row += 1;
            }
        }
        let residuals = actual.iter().zip(&fitted).map(|(a, f)| a - f).collect();

        self.state = Some(LagState::from_panel(panel, target, &self.lags)?);
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    /// Forecast with known future values for the covariates used in the fit.
    pub fn predict_with_covariates(
        &self,
        horizon: usize,
        future: &BTreeMap<String, Vec<f64>>,
    ) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        IterativeForecaster::new().forecast_with_covariates(&self.regressor, state, horizon, future)
    }
}

impl<R: Regressor> Forecaster for LagForecaster<R> {
    fn fit(&mut self, series: &Series) -> Result<()> {
        self.fit_panel(&Panel::from_series(series), series.name())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.predict_with_covariates(horizon, &BTreeMap::new())
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        self.regressor.name()
    }
}
