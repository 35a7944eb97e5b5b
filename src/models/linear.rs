//! Ordinary least squares on lagged features.

use crate::error::{ForecastError, Result};
use crate::models::Regressor;
use crate::utils::{ols_fit, OlsFit};
use tracing::debug;

/// Unregularized linear regression with an intercept.
///
/// Deterministic for fixed inputs. Collinear lag columns receive a zero
/// coefficient rather than failing the fit.
#[derive(Debug, Clone, Default)]
pub struct LinearLagRegressor {
    fit: Option<OlsFit>,
}

impl LinearLagRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.coefficients.as_slice())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for LinearLagRegressor {
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
        let fit = ols_fit(features, target, true)
            .map_err(|e| ForecastError::ModelFit(format!("linear regression: {e}")))?;
        debug!(
            observations = fit.n_obs,
            rank = fit.rank,
            rss = fit.rss,
            "fitted linear lag regressor"
        );
        self.fit = Some(fit);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let fit = self.fit.as_ref().ok_or(ForecastError::FitRequired)?;
        if row.len() != fit.num_regressors() {
            return Err(ForecastError::DimensionMismatch {
                expected: fit.num_regressors(),
                got: row.len(),
            });
        }
        Ok(fit.predict_row(row))
    }

    fn name(&self) -> &str {
        "LinearRegression"
    }

    fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }
}
