//! Seasonal ARIMA with deterministic trend and exogenous regressors.
//!
//! Estimation is two-step. Trend and exogenous columns are first removed by
//! OLS; the remaining series is differenced with `(1 - B)^d (1 - B^s)^D` and an
//! ARMA(p, q)×(P, Q)s model is fitted to it by conditional sum of squares.
//! Parameters are not constrained to the stationary or invertible region.

use super::diff::{difference, differencing_polynomial, integrate, poly_mul};
use crate::config::{SeriesModelConfig, Trend};
use crate::core::{Forecast, Series, YearMonth};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::utils::{nelder_mead, ols_fit, NelderMeadConfig, OlsFit};
use tracing::{debug, warn};

/// Orders of a seasonal ARIMA model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarimaSpec {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
    pub trend: Trend,
}

impl SarimaSpec {
    /// `order` is `(p, d, q)`, `seasonal_order` is `(P, D, Q, s)`.
    pub fn new(order: [usize; 3], seasonal_order: [usize; 4]) -> Self {
        let [p, d, q] = order;
        let [seasonal_p, seasonal_d, seasonal_q, period] = seasonal_order;
        Self {
            p,
            d,
            q,
            seasonal_p,
            seasonal_d,
            seasonal_q,
            period,
            trend: Trend::None,
        }
    }

    pub fn from_config(config: &SeriesModelConfig) -> Self {
        Self::new(config.order, config.seasonal_order).with_trend(config.trend)
    }

    pub fn with_trend(mut self, trend: Trend) -> Self {
        self.trend = trend;
        self
    }

    /// Number of ARMA coefficients (excluding the mean).
    pub fn num_arma_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// A free mean is estimated only for undifferenced series without a trend term.
    pub fn has_mean(&self) -> bool {
        self.d + self.seasonal_d == 0 && self.trend == Trend::None
    }

    fn has_seasonal_terms(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    fn validate(&self) -> Result<()> {
        if self.period == 0 && self.has_seasonal_terms() {
            return Err(ForecastError::InvalidParameter(
                "seasonal terms need a positive seasonal period".into(),
            ));
        }
        if self.period == 1 && self.has_seasonal_terms() {
            return Err(ForecastError::InvalidParameter(
                "seasonal period must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Estimated coefficients, in the sign convention
/// `φ(B) Φ(B^s) (w_t - μ) = θ(B) Θ(B^s) e_t` with `φ(B) = 1 - φ₁B - …`
/// and `θ(B) = 1 + θ₁B + …`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SarimaCoefficients {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    pub mean: f64,
}

impl SarimaCoefficients {
    fn from_params(spec: &SarimaSpec, params: &[f64]) -> Self {
        let mut rest = params;
        let mut take = |k: usize| {
            let (head, tail) = rest.split_at(k);
            rest = tail;
            head.to_vec()
        };
        let ar = take(spec.p);
        let ma = take(spec.q);
        let seasonal_ar = take(spec.seasonal_p);
        let seasonal_ma = take(spec.seasonal_q);
        let mean = rest.first().copied().unwrap_or(0.0);
        Self {
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
            mean,
        }
    }

    /// Multiply out the seasonal and non-seasonal polynomials. Returns
    /// `(a, m)` with `w_t - μ = Σ a_i (w_{t-i} - μ) + e_t + Σ m_j e_{t-j}`.
    fn expand(&self, period: usize) -> (Vec<f64>, Vec<f64>) {
        let ar = poly_mul(
            &lag_poly(&self.ar, 1, -1.0),
            &lag_poly(&self.seasonal_ar, period, -1.0),
        );
        let ma = poly_mul(
            &lag_poly(&self.ma, 1, 1.0),
            &lag_poly(&self.seasonal_ma, period, 1.0),
        );
        (
            ar.iter().skip(1).map(|c| -c).collect(),
            ma.iter().skip(1).copied().collect(),
        )
    }
}

/// `1 + sign·(c₁ B^step + c₂ B^{2·step} + …)`
fn lag_poly(coefs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefs.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefs.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// One-step errors of the ARMA recursion on `w`; zero before the AR span.
fn css_errors(w: &[f64], ar: &[f64], ma: &[f64], mean: f64) -> Vec<f64> {
    let mut errors = vec![0.0; w.len()];
    for t in ar.len()..w.len() {
        let mut pred = mean;
        for (i, a) in ar.iter().enumerate() {
            pred += a * (w[t - 1 - i] - mean);
        }
        for (j, m) in ma.iter().enumerate() {
            if t > j {
                pred += m * errors[t - 1 - j];
            }
        }
        errors[t] = w[t] - pred;
    }
    errors
}

#[derive(Debug, Clone)]
struct FittedState {
    coefficients: SarimaCoefficients,
    ar: Vec<f64>,
    ma: Vec<f64>,
    diff_poly: Vec<f64>,
    regression: Option<OlsFit>,
    n_exog: usize,
    /// Series after removing the regression part.
    level: Vec<f64>,
    /// Differenced `level`.
    differenced: Vec<f64>,
    errors: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    last_month: YearMonth,
    css: f64,
    usable: usize,
    converged: bool,
}

/// Seasonal ARIMA forecaster with fixed, externally supplied orders.
#[derive(Debug, Clone)]
pub struct Sarima {
    spec: SarimaSpec,
    optimizer: NelderMeadConfig,
    state: Option<FittedState>,
}

impl Sarima {
    pub fn new(spec: SarimaSpec) -> Self {
        Self {
            spec,
            optimizer: NelderMeadConfig {
                max_iter: 5000,
                tolerance: 1e-10,
                ..NelderMeadConfig::default()
            },
            state: None,
        }
    }

    pub fn from_config(config: &SeriesModelConfig) -> Self {
        Self::new(SarimaSpec::from_config(config))
    }

    pub fn with_optimizer(mut self, config: NelderMeadConfig) -> Self {
        self.optimizer = config;
        self
    }

    pub fn spec(&self) -> &SarimaSpec {
        &self.spec
    }

    pub fn coefficients(&self) -> Option<&SarimaCoefficients> {
        self.state.as_ref().map(|s| &s.coefficients)
    }

    /// Regression on `[1, t, exog…]` removed before the ARMA fit.
    pub fn regression(&self) -> Option<&OlsFit> {
        self.state.as_ref().and_then(|s| s.regression.as_ref())
    }

    /// Residual variance `css / usable`.
    pub fn sigma2(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.css / s.usable as f64)
    }

    /// Gaussian AIC of the conditional fit.
    pub fn aic(&self) -> Option<f64> {
        self.state.as_ref().map(|s| {
            let n = s.usable as f64;
            let k = (self.spec.num_arma_params() + usize::from(self.spec.has_mean())) as f64;
            n * (s.css / n).ln() + 2.0 * k
        })
    }

    /// Whether the optimizer met its tolerance in the last fit.
    pub fn converged(&self) -> Option<bool> {
        self.state.as_ref().map(|s| s.converged)
    }

    /// Fit on `series` with exogenous columns aligned to it.
    pub fn fit_exog(&mut self, series: &Series, exog: &[Vec<f64>]) -> Result<()> {
        self.spec.validate()?;
        let y = series.values();
        let n = y.len();
        let last_month = series.last_month().ok_or(ForecastError::EmptyData)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(format!(
                "SARIMA input '{}' has missing values",
                series.name()
            )));
        }
        if let Some(bad) = exog.iter().find(|c| c.len() != n) {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: bad.len(),
            });
        }

        let regression = self.fit_regression(y, exog)?;
        let level: Vec<f64> = match &regression {
            Some(fit) => (0..n)
                .map(|t| y[t] - fit.predict_row(&self.design_row(t, exog, t)))
                .collect(),
            None => y.to_vec(),
        };

        let diff_poly =
            differencing_polynomial(self.spec.d, self.spec.seasonal_d, self.spec.period);
        let k = diff_poly.len() - 1;
        let differenced = difference(&level, &diff_poly);

        let ar_span = self.spec.p + self.spec.seasonal_p * self.spec.period;
        let n_params = self.spec.num_arma_params() + usize::from(self.spec.has_mean());
        let usable = differenced.len().saturating_sub(ar_span);
        if usable <= n_params {
            return Err(ForecastError::ModelFit(format!(
                "SARIMA on '{}': {usable} usable observations for {n_params} parameters",
                series.name()
            )));
        }

        let w_mean = differenced.iter().sum::<f64>() / differenced.len() as f64;
        let mut initial = Vec::with_capacity(n_params);
        initial.extend((0..self.spec.p).map(|i| 0.1 / (i + 1) as f64));
        initial.extend(std::iter::repeat(0.0).take(self.spec.q));
        initial.extend((0..self.spec.seasonal_p).map(|i| 0.1 / (i + 1) as f64));
        initial.extend(std::iter::repeat(0.0).take(self.spec.seasonal_q));
        if self.spec.has_mean() {
            initial.push(w_mean);
        }

        let spec = self.spec;
        let period = spec.period;
        let objective = |params: &[f64]| {
            let coefs = SarimaCoefficients::from_params(&spec, params);
            let (ar, ma) = coefs.expand(period);
            css_errors(&differenced, &ar, &ma, coefs.mean)[ar.len()..]
                .iter()
                .map(|e| e * e)
                .sum::<f64>()
        };

        let (params, css, converged) = if n_params == 0 {
            (Vec::new(), objective(&[]), true)
        } else {
            let result = nelder_mead(objective, &initial, &self.optimizer);
            (result.optimal_point, result.optimal_value, result.converged)
        };
        if !css.is_finite() {
            return Err(ForecastError::ModelFit(format!(
                "SARIMA on '{}': objective is not finite at the optimum",
                series.name()
            )));
        }
        if !converged {
            warn!(series = series.name(), css, "SARIMA optimizer did not converge");
        }

        let coefficients = SarimaCoefficients::from_params(&self.spec, &params);
        let (ar, ma) = coefficients.expand(period);
        let errors = css_errors(&differenced, &ar, &ma, coefficients.mean);

        // Level-scale residual at index i equals the ARMA error at i - k.
        let first = k + ar.len();
        let residuals: Vec<f64> = (0..n)
            .map(|i| if i < first { f64::NAN } else { errors[i - k] })
            .collect();
        let fitted = y.iter().zip(&residuals).map(|(v, e)| v - e).collect();

        debug!(
            series = series.name(),
            css,
            usable,
            ar = ?coefficients.ar,
            ma = ?coefficients.ma,
            seasonal_ar = ?coefficients.seasonal_ar,
            seasonal_ma = ?coefficients.seasonal_ma,
            "fitted SARIMA"
        );

        self.state = Some(FittedState {
            coefficients,
            ar,
            ma,
            diff_poly,
            regression,
            n_exog: exog.len(),
            level,
            differenced,
            errors,
            fitted,
            residuals,
            last_month,
            css,
            usable,
            converged,
        });
        Ok(())
    }

    /// Forecast `horizon` months; `future_exog` holds one column per
    /// exogenous regressor with at least `horizon` values each.
    pub fn predict_exog(&self, horizon: usize, future_exog: &[Vec<f64>]) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        if future_exog.len() != state.n_exog {
            return Err(ForecastError::DimensionMismatch {
                expected: state.n_exog,
                got: future_exog.len(),
            });
        }
        if let Some(short) = future_exog.iter().find(|c| c.len() < horizon) {
            return Err(ForecastError::DimensionMismatch {
                expected: horizon,
                got: short.len(),
            });
        }

        let mean = state.coefficients.mean;
        let mut w = state.differenced.clone();
        let mut e = state.errors.clone();
        for _ in 0..horizon {
            let t = w.len();
            let mut pred = mean;
            for (i, a) in state.ar.iter().enumerate() {
                pred += a * (w[t - 1 - i] - mean);
            }
            for (j, m) in state.ma.iter().enumerate() {
                if t > j {
                    pred += m * e[t - 1 - j];
                }
            }
            w.push(pred);
            e.push(0.0);
        }
        let diff_forecast = w.split_off(state.differenced.len());
        let mut values = integrate(&diff_forecast, &state.level, &state.diff_poly);

        if let Some(fit) = &state.regression {
            let n = state.level.len();
            for (h, v) in values.iter_mut().enumerate() {
                *v += fit.predict_row(&self.design_row(n + h, future_exog, h));
            }
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(
                "SARIMA forecast is not finite".into(),
            ));
        }
        Ok(Forecast::after(state.last_month, values))
    }

    fn fit_regression(&self, y: &[f64], exog: &[Vec<f64>]) -> Result<Option<OlsFit>> {
        let trend = self.spec.trend;
        if trend == Trend::None && exog.is_empty() {
            return Ok(None);
        }
        let rows: Vec<Vec<f64>> = (0..y.len()).map(|t| self.design_row(t, exog, t)).collect();
        ols_fit(&rows, y, trend.has_constant())
            .map(Some)
            .map_err(|e| ForecastError::ModelFit(format!("SARIMA trend regression: {e}")))
    }

    /// `[t?, exog[0][row], exog[1][row], …]` for time index `t`.
    fn design_row(&self, t: usize, exog: &[Vec<f64>], row: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(exog.len() + 1);
        if self.spec.trend.has_linear() {
            out.push(t as f64);
        }
        out.extend(exog.iter().map(|c| c[row]));
        out
    }
}

impl Forecaster for Sarima {
    fn fit(&mut self, series: &Series) -> Result<()> {
        self.fit_exog(series, &[])
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.predict_exog(horizon, &[])
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "SARIMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn series(values: Vec<f64>) -> Series {
        Series::from_start("y", YearMonth::new(2015, 1).unwrap(), values)
    }

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen::<f64>() - 0.5).collect()
    }

    #[test]
    fn expands_multiplicative_polynomials() {
        let spec = SarimaSpec::new([1, 0, 1], [1, 0, 1, 4]);
        let coefs = SarimaCoefficients::from_params(&spec, &[0.5, 0.3, 0.2, -0.4]);
        let (ar, ma) = coefs.expand(4);
        // (1 - 0.5B)(1 - 0.2B^4) = 1 - 0.5B - 0.2B^4 + 0.1B^5
        assert_eq!(ar.len(), 5);
        assert_relative_eq!(ar[0], 0.5);
        assert_relative_eq!(ar[3], 0.2);
        assert_relative_eq!(ar[4], -0.1);
        // (1 + 0.3B)(1 - 0.4B^4) = 1 + 0.3B - 0.4B^4 - 0.12B^5
        assert_relative_eq!(ma[0], 0.3);
        assert_relative_eq!(ma[3], -0.4);
        assert_relative_eq!(ma[4], -0.12);
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let e = noise(400, 3);
        let mut y = vec![0.0; 400];
        for t in 1..400 {
            y[t] = 0.6 * y[t - 1] + e[t];
        }
        let mut model = Sarima::new(SarimaSpec::new([1, 0, 0], [0, 0, 0, 12]));
        model.fit(&series(y)).unwrap();
        let coefs = model.coefficients().unwrap();
        assert!((coefs.ar[0] - 0.6).abs() < 0.1, "phi = {}", coefs.ar[0]);
        assert!(coefs.mean.abs() < 0.2);
        assert!(model.sigma2().unwrap() > 0.0);
    }

    #[test]
    fn seasonal_random_walk_repeats_last_cycle() {
        let values: Vec<f64> = (0..36)
            .map(|i| 10.0 + (i % 12) as f64)
            .collect();
        let mut model = Sarima::new(SarimaSpec::new([0, 0, 0], [0, 1, 0, 12]));
        model.fit(&series(values.clone())).unwrap();
        let forecast = model.predict(24).unwrap();
        for h in 0..24 {
            assert_relative_eq!(forecast.values()[h], values[24 + h % 12], epsilon = 1e-9);
        }
        assert_eq!(forecast.months()[0], YearMonth::new(2018, 1).unwrap());
    }

    #[test]
    fn linear_trend_extrapolates() {
        let values: Vec<f64> = (0..40).map(|t| 2.0 + 0.5 * t as f64).collect();
        let spec = SarimaSpec::new([0, 1, 0], [0, 0, 0, 12]).with_trend(Trend::ConstantLinear);
        let mut model = Sarima::new(spec);
        model.fit(&series(values)).unwrap();
        let forecast = model.predict(6).unwrap();
        for (h, v) in forecast.values().iter().enumerate() {
            assert_relative_eq!(*v, 2.0 + 0.5 * (40 + h) as f64, epsilon = 1e-6);
        }
    }

    #[test]
    fn exogenous_regressor_drives_forecast() {
        let x: Vec<f64> = (0..60).map(|t| ((t * 5) % 17) as f64).collect();
        let e = noise(60, 11);
        let y: Vec<f64> = x
            .iter()
            .zip(&e)
            .map(|(x, e)| 1.0 + 3.0 * x + 0.01 * e)
            .collect();
        let spec = SarimaSpec::new([0, 0, 0], [0, 0, 0, 12]).with_trend(Trend::Constant);
        let mut model = Sarima::new(spec);
        model.fit_exog(&series(y), &[x]).unwrap();

        let future = vec![vec![2.0, 4.0, 6.0]];
        let forecast = model.predict_exog(3, &future).unwrap();
        assert_relative_eq!(forecast.values()[0], 7.0, epsilon = 0.05);
        assert_relative_eq!(forecast.values()[2], 19.0, epsilon = 0.05);

        assert!(matches!(
            model.predict(3),
            Err(ForecastError::DimensionMismatch { expected: 1, got: 0 })
        ));
        assert!(matches!(
            model.predict_exog(5, &future),
            Err(ForecastError::DimensionMismatch { expected: 5, got: 3 })
        ));
    }

    #[test]
    fn residuals_and_fitted_sum_to_observations() {
        let e = noise(80, 5);
        let values: Vec<f64> = (0..80)
            .map(|t| 50.0 + (t as f64 * 0.5).sin() * 3.0 + e[t])
            .collect();
        let mut model = Sarima::new(SarimaSpec::new([1, 1, 1], [0, 0, 0, 12]));
        model.fit(&series(values.clone())).unwrap();
        let fitted = model.fitted_values().unwrap();
        let resid = model.residuals().unwrap();
        assert!(fitted[0].is_nan() && fitted[1].is_nan());
        for t in 2..80 {
            assert_relative_eq!(fitted[t] + resid[t], values[t], epsilon = 1e-9);
        }
        assert!(model.predict(12).unwrap().values().iter().all(|v| v.is_finite()));
        assert!(model.aic().unwrap().is_finite());
    }

    #[test]
    fn too_short_for_seasonal_orders_is_a_fit_error() {
        let values: Vec<f64> = (0..30).map(|t| 100.0 + t as f64).collect();
        let mut model = Sarima::new(SarimaSpec::new([1, 1, 1], [1, 1, 1, 12]));
        assert!(matches!(
            model.fit(&series(values)),
            Err(ForecastError::ModelFit(_))
        ));
        assert!(!model.is_fitted());
        assert!(matches!(model.predict(3), Err(ForecastError::FitRequired)));
    }

    #[test]
    fn seasonal_terms_without_period_are_rejected() {
        let mut model = Sarima::new(SarimaSpec::new([0, 0, 0], [1, 0, 0, 0]));
        assert!(matches!(
            model.fit(&series(vec![1.0; 30])),
            Err(ForecastError::InvalidParameter(_))
        ));
    }
}
