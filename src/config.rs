//! Run configuration: lag set, horizon, per-series model orders and search grids.
//!
//! A [`ForecastConfig`] is passed explicitly into the orchestrator; nothing
//! here is global.

use crate::error::{ForecastError, Result};
use crate::features::LagSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Deterministic trend term added to a SARIMA model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    #[default]
    None,
    Constant,
    Linear,
    ConstantLinear,
}

impl Trend {
    pub fn has_constant(&self) -> bool {
        matches!(self, Trend::Constant | Trend::ConstantLinear)
    }

    pub fn has_linear(&self) -> bool {
        matches!(self, Trend::Linear | Trend::ConstantLinear)
    }
}

/// SARIMA orders and regressors for one target series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesModelConfig {
    /// Non-seasonal `[p, d, q]`.
    pub order: [usize; 3],
    /// Seasonal `[P, D, Q, s]`.
    pub seasonal_order: [usize; 4],
    #[serde(default)]
    pub trend: Trend,
    /// Covariate columns of the panel used as exogenous regressors.
    #[serde(default)]
    pub exogenous: Vec<String>,
}

impl SeriesModelConfig {
    pub fn new(order: [usize; 3], seasonal_order: [usize; 4]) -> Self {
        Self {
            order,
            seasonal_order,
            trend: Trend::None,
            exogenous: Vec::new(),
        }
    }

    pub fn with_trend(mut self, trend: Trend) -> Self {
        self.trend = trend;
        self
    }

    pub fn with_exogenous(mut self, columns: Vec<String>) -> Self {
        self.exogenous = columns;
        self
    }
}

/// Hyperparameter grid and stopping rules for the gradient-boosted models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterSearchConfig {
    pub learning_rates: Vec<f64>,
    pub max_depths: Vec<usize>,
    /// L1 leaf regularization candidates.
    pub reg_alphas: Vec<f64>,
    /// L2 leaf regularization candidates.
    pub reg_lambdas: Vec<f64>,
    /// Forward-chaining folds used to score each candidate.
    pub folds: usize,
    /// Upper bound on boosting rounds.
    pub max_rounds: usize,
    /// Stop after this many rounds without validation improvement.
    pub early_stopping_rounds: usize,
    /// Share of the training window held out for early stopping.
    pub validation_fraction: f64,
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoosterSearchConfig {
    fn default() -> Self {
        Self {
            learning_rates: vec![0.05, 0.1, 0.3],
            max_depths: vec![2, 3, 4],
            reg_alphas: vec![0.0, 0.1],
            reg_lambdas: vec![1.0],
            folds: 3,
            max_rounds: 200,
            early_stopping_rounds: 10,
            validation_fraction: 0.2,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl BoosterSearchConfig {
    /// A one-candidate grid, handy for tests and quick runs.
    pub fn single(learning_rate: f64, max_depth: usize) -> Self {
        Self {
            learning_rates: vec![learning_rate],
            max_depths: vec![max_depth],
            reg_alphas: vec![0.0],
            reg_lambdas: vec![1.0],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.learning_rates.is_empty()
            || self.max_depths.is_empty()
            || self.reg_alphas.is_empty()
            || self.reg_lambdas.is_empty()
        {
            return Err(ForecastError::Configuration(
                "booster grid must have at least one value per axis".to_string(),
            ));
        }
        if self.learning_rates.iter().any(|&lr| !(lr > 0.0 && lr <= 1.0)) {
            return Err(ForecastError::Configuration(
                "booster learning rates must be in (0, 1]".to_string(),
            ));
        }
        if self.max_depths.contains(&0) {
            return Err(ForecastError::Configuration(
                "booster max depth must be positive".to_string(),
            ));
        }
        if self.reg_alphas.iter().chain(&self.reg_lambdas).any(|&r| r < 0.0) {
            return Err(ForecastError::Configuration(
                "booster regularization must be non-negative".to_string(),
            ));
        }
        if self.max_rounds == 0 || self.early_stopping_rounds == 0 {
            return Err(ForecastError::Configuration(
                "booster rounds must be positive".to_string(),
            ));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(ForecastError::Configuration(
                "booster validation fraction must be in (0, 1)".to_string(),
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ForecastError::Configuration(
                "booster subsample must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unit-root test settings for the stationarity analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationarityConfig {
    pub significance: f64,
    pub max_differences: usize,
}

impl Default for StationarityConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            max_differences: 3,
        }
    }
}

/// Everything a forecasting run needs besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub lags: Vec<usize>,
    pub horizon: usize,
    /// Chronological hold-out share used for evaluation.
    pub test_fraction: f64,
    /// Seasonal period in months.
    pub period: usize,
    pub series: BTreeMap<String, SeriesModelConfig>,
    pub booster: BoosterSearchConfig,
    pub stationarity: StationarityConfig,
    /// Run targets of a batch on the rayon pool.
    pub parallel: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lags: (1..=12).collect(),
            horizon: 12,
            test_fraction: 0.2,
            period: 12,
            series: BTreeMap::new(),
            booster: BoosterSearchConfig::default(),
            stationarity: StationarityConfig::default(),
            parallel: false,
        }
    }
}

impl ForecastConfig {
    /// Load from a JSON file and validate.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ForecastConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Register orders for a target series.
    pub fn with_series(mut self, target: impl Into<String>, model: SeriesModelConfig) -> Self {
        self.series.insert(target.into(), model);
        self
    }

    pub fn with_booster(mut self, booster: BoosterSearchConfig) -> Self {
        self.booster = booster;
        self
    }

    /// The configured lag set.
    pub fn lag_set(&self) -> Result<LagSet> {
        LagSet::new(self.lags.iter().copied())
            .map_err(|e| ForecastError::Configuration(format!("lags: {e}")))
    }

    /// Model orders for `target`, or a configuration error if none were supplied.
    pub fn model_for(&self, target: &str) -> Result<&SeriesModelConfig> {
        self.series.get(target).ok_or_else(|| {
            ForecastError::Configuration(format!("no SARIMA orders configured for '{target}'"))
        })
    }

    /// Check value ranges. Per-series orders are checked only for seasonal period.
    pub fn validate(&self) -> Result<()> {
        self.lag_set()?;
        if self.horizon == 0 {
            return Err(ForecastError::Configuration(
                "horizon must be positive".to_string(),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction <= 0.5) {
            return Err(ForecastError::Configuration(format!(
                "test_fraction must be in (0, 0.5], got {}",
                self.test_fraction
            )));
        }
        if self.period < 2 {
            return Err(ForecastError::Configuration(
                "period must be at least 2".to_string(),
            ));
        }
        if !(self.stationarity.significance > 0.0 && self.stationarity.significance < 1.0) {
            return Err(ForecastError::Configuration(
                "stationarity significance must be in (0, 1)".to_string(),
            ));
        }
        for (name, model) in &self.series {
            let [sp, sd, sq, s] = model.seasonal_order;
            if (sp + sd + sq) > 0 && s < 2 {
                return Err(ForecastError::Configuration(format!(
                    "'{name}': seasonal period must be at least 2 when seasonal terms are used"
                )));
            }
        }
        self.booster.validate()
    }
}
