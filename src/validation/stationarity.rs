//! Unit-root testing and the differencing loop built on it.
//!
//! [`adf_test`] runs an augmented Dickey-Fuller regression with a constant.
//! [`StationarityAnalyzer`] applies it to panel columns, differencing the
//! columns that fail until every column passes or the pass limit is hit.

use crate::config::StationarityConfig;
use crate::core::Panel;
use crate::error::{ForecastError, Result};
use crate::utils::ols_fit;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, warn};

/// Critical values of the ADF statistic.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CriticalValues {
    pub cv_1pct: f64,
    pub cv_5pct: f64,
    pub cv_10pct: f64,
}

/// Result of an augmented Dickey-Fuller test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient. `NaN` for degenerate input.
    pub statistic: f64,
    pub p_value: f64,
    /// Number of lagged differences in the chosen regression.
    pub used_lag: usize,
    /// Observations in the chosen regression.
    pub n_obs: usize,
    pub critical_values: CriticalValues,
}

impl AdfResult {
    fn degenerate(used_lag: usize, n_obs: usize) -> Self {
        Self {
            statistic: f64::NAN,
            p_value: f64::NAN,
            used_lag,
            n_obs,
            critical_values: CriticalValues::default(),
        }
    }

    /// True when the unit-root null is rejected at `significance`.
    /// A `NaN` p-value never counts as stationary.
    pub fn is_stationary(&self, significance: f64) -> bool {
        self.p_value <= significance
    }

    pub fn is_degenerate(&self) -> bool {
        self.statistic.is_nan()
    }
}

/// Augmented Dickey-Fuller test with a constant term.
///
/// Fits `Δy_t = α + β y_{t-1} + Σ γ_i Δy_{t-i}`, choosing the number of
/// lagged differences by AIC up to `max_lag` (default `⌊12 (n/100)^¼⌋`).
/// Non-finite values are skipped.
pub fn adf_test(series: &[f64], max_lag: Option<usize>) -> AdfResult {
    let y: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let n = y.len();
    if n < 6 {
        return AdfResult::degenerate(0, n);
    }

    let default_lag = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
    let max_lag = max_lag.unwrap_or(default_lag).min(n / 2 - 2);

    let diff: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();

    // Every candidate is scored on the sample usable by the largest lag.
    let mut best = (0usize, f64::INFINITY);
    for lag in 0..=max_lag {
        let Some((rows, target)) = adf_design(&y, &diff, lag, max_lag) else {
            continue;
        };
        let Ok(fit) = ols_fit(&rows, &target, true) else {
            continue;
        };
        let nobs = target.len() as f64;
        let aic = if fit.rss > 0.0 {
            nobs * (fit.rss / nobs).ln() + 2.0 * fit.rank as f64
        } else {
            f64::NEG_INFINITY
        };
        if aic < best.1 {
            best = (lag, aic);
        }
    }
    let used_lag = best.0;

    let Some((rows, target)) = adf_design(&y, &diff, used_lag, used_lag) else {
        return AdfResult::degenerate(used_lag, 0);
    };
    let n_obs = target.len();
    let Ok(fit) = ols_fit(&rows, &target, true) else {
        return AdfResult::degenerate(used_lag, n_obs);
    };

    let statistic = fit.coefficients[0] / fit.std_errors[0];
    if !statistic.is_finite() {
        return AdfResult::degenerate(used_lag, n_obs);
    }

    AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag,
        n_obs,
        critical_values: mackinnon_critical_values(n_obs),
    }
}

/// Rows `[y_{t-1}, Δy_{t-1}, .., Δy_{t-lag}]` and targets `Δy_t` starting at
/// difference index `start`.
fn adf_design(
    y: &[f64],
    diff: &[f64],
    lag: usize,
    start: usize,
) -> Option<(Vec<Vec<f64>>, Vec<f64>)> {
    if diff.len() <= start + lag + 2 {
        return None;
    }
    let mut rows = Vec::with_capacity(diff.len() - start);
    let mut target = Vec::with_capacity(diff.len() - start);
    for t in start..diff.len() {
        let mut row = Vec::with_capacity(lag + 1);
        row.push(y[t]);
        row.extend((1..=lag).map(|i| diff[t - i]));
        rows.push(row);
        target.push(diff[t]);
    }
    Some((rows, target))
}

/// MacKinnon (1994) approximate p-value, constant-only regression.
fn mackinnon_p_value(stat: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let coefs: &[f64] = if stat <= TAU_STAR { &SMALL_P } else { &LARGE_P };
    let z: f64 = coefs
        .iter()
        .enumerate()
        .map(|(i, c)| c * stat.powi(i as i32))
        .sum();

    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(z),
        Err(_) => f64::NAN,
    }
}

/// MacKinnon (2010) finite-sample critical values, constant-only regression.
fn mackinnon_critical_values(n_obs: usize) -> CriticalValues {
    let t = n_obs as f64;
    let surface = |c: [f64; 4]| c[0] + c[1] / t + c[2] / t.powi(2) + c[3] / t.powi(3);
    CriticalValues {
        cv_1pct: surface([-3.43035, -6.5393, -16.786, -79.433]),
        cv_5pct: surface([-2.86154, -2.8903, -4.234, -40.04]),
        cv_10pct: surface([-2.56677, -1.5384, -2.809, 0.0]),
    }
}

/// Diagnostics for one analyzed column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStationarity {
    pub name: String,
    /// ADF statistic from the final test of this column.
    pub statistic: f64,
    pub p_value: f64,
    /// Differencing passes applied to this column.
    pub differences: usize,
    pub is_stationary: bool,
    /// The final test could not be computed (constant or too short).
    pub degenerate: bool,
}

/// Output of [`StationarityAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct StationarityReport {
    /// Differenced, absolute-valued columns, aligned on a common month index.
    pub panel: Panel,
    pub columns: Vec<ColumnStationarity>,
    /// Differencing passes performed over the panel.
    pub passes: usize,
}

impl StationarityReport {
    pub fn all_stationary(&self) -> bool {
        self.columns.iter().all(|c| c.is_stationary)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStationarity> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Differences panel columns until they pass the ADF test.
#[derive(Debug, Clone, Copy, Default)]
pub struct StationarityAnalyzer {
    config: StationarityConfig,
}

impl StationarityAnalyzer {
    pub fn new(config: StationarityConfig) -> Self {
        Self { config }
    }

    /// Analyze every column of `panel`.
    pub fn analyze_all(&self, panel: &Panel) -> Result<StationarityReport> {
        let names = panel.column_names();
        self.analyze(panel, &names)
    }

    /// Analyze the named columns.
    ///
    /// Each pass differences only the columns that still fail; the others
    /// lose their first row so the panel stays aligned. At most
    /// `max_differences` passes are made. A column that never passes is
    /// reported, not treated as an error.
    pub fn analyze(&self, panel: &Panel, names: &[&str]) -> Result<StationarityReport> {
        if names.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "no columns to analyze".into(),
            ));
        }
        let significance = self.config.significance;

        let mut months = panel.months().to_vec();
        let mut columns: Vec<Vec<f64>> = names
            .iter()
            .map(|name| panel.column(name).map(<[f64]>::to_vec))
            .collect::<Result<_>>()?;
        let mut differences = vec![0usize; names.len()];
        let mut passes = 0;

        let mut results: Vec<AdfResult> = columns.iter().map(|c| adf_test(c, None)).collect();
        loop {
            let failing: Vec<bool> = results
                .iter()
                .map(|r| !r.is_stationary(significance))
                .collect();
            debug!(
                pass = passes,
                failing = failing.iter().filter(|f| **f).count(),
                "stationarity pass"
            );
            if !failing.contains(&true) || passes >= self.config.max_differences || months.len() < 2
            {
                break;
            }

            for (i, column) in columns.iter_mut().enumerate() {
                *column = if failing[i] {
                    differences[i] += 1;
                    column.windows(2).map(|w| w[1] - w[0]).collect()
                } else {
                    column[1..].to_vec()
                };
            }
            months.remove(0);
            passes += 1;
            results = columns.iter().map(|c| adf_test(c, None)).collect();
        }

        let report_columns: Vec<ColumnStationarity> = names
            .iter()
            .zip(&results)
            .zip(&differences)
            .map(|((name, r), &d)| {
                let is_stationary = r.is_stationary(significance);
                if !is_stationary {
                    warn!(
                        column = %name,
                        differences = d,
                        p_value = r.p_value,
                        degenerate = r.is_degenerate(),
                        "column not stationary after differencing"
                    );
                }
                ColumnStationarity {
                    name: name.to_string(),
                    statistic: r.statistic,
                    p_value: r.p_value,
                    differences: d,
                    is_stationary,
                    degenerate: r.is_degenerate(),
                }
            })
            .collect();

        let panel = Panel::new(
            months,
            names
                .iter()
                .zip(columns)
                .map(|(name, c)| (name.to_string(), c.into_iter().map(f64::abs).collect()))
                .collect(),
        )?;

        Ok(StationarityReport {
            panel,
            columns: report_columns,
            passes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::YearMonth;
    use approx::assert_relative_eq;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        // Small LCG so the test data is fixed without pulling in rand.
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    fn random_walk(n: usize, seed: u64) -> Vec<f64> {
        noise(n, seed)
            .iter()
            .scan(100.0, |acc, e| {
                *acc += e;
                Some(*acc)
            })
            .collect()
    }

    fn panel(columns: Vec<(&str, Vec<f64>)>) -> Panel {
        let n = columns[0].1.len();
        Panel::new(
            YearMonth::new(2010, 1).unwrap().range(n),
            columns
                .into_iter()
                .map(|(name, v)| (name.to_string(), v))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn white_noise_is_stationary() {
        let result = adf_test(&noise(200, 7), None);
        assert!(result.statistic < result.critical_values.cv_1pct);
        assert!(result.is_stationary(0.05));
    }

    #[test]
    fn random_walk_is_not_stationary() {
        let result = adf_test(&random_walk(200, 11), None);
        assert!(result.p_value > 0.05);
        assert!(!result.is_stationary(0.05));
    }

    #[test]
    fn constant_series_is_degenerate() {
        let result = adf_test(&[5.0; 50], None);
        assert!(result.is_degenerate());
        assert!(result.p_value.is_nan());
        assert!(!result.is_stationary(0.05));
    }

    #[test]
    fn p_value_is_monotone_in_statistic() {
        let a = mackinnon_p_value(-4.0);
        let b = mackinnon_p_value(-2.86);
        let c = mackinnon_p_value(0.0);
        assert!(a < b && b < c);
        assert_relative_eq!(b, 0.05, epsilon = 0.01);
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-20.0), 0.0);
    }

    #[test]
    fn critical_values_approach_asymptotic() {
        let cv = mackinnon_critical_values(100_000);
        assert_relative_eq!(cv.cv_5pct, -2.86154, epsilon = 1e-3);
        let small = mackinnon_critical_values(50);
        assert!(small.cv_1pct < cv.cv_1pct);
    }

    #[test]
    fn analyzer_differences_only_failing_columns() {
        let walk = random_walk(150, 3);
        let stationary = noise(150, 5);
        let p = panel(vec![("walk", walk), ("noise", stationary)]);

        let report = StationarityAnalyzer::default().analyze_all(&p).unwrap();
        assert_eq!(report.passes, 1);
        assert_eq!(report.column("walk").unwrap().differences, 1);
        assert_eq!(report.column("noise").unwrap().differences, 0);
        assert!(report.all_stationary());
        assert_eq!(report.panel.nrows(), 149);
        assert!(report
            .panel
            .column("noise")
            .unwrap()
            .iter()
            .all(|v| *v >= 0.0));
    }

    #[test]
    fn constant_column_stops_after_three_passes() {
        let p = panel(vec![("flat", vec![3.0; 40])]);
        let report = StationarityAnalyzer::default().analyze_all(&p).unwrap();
        assert_eq!(report.passes, 3);
        let col = report.column("flat").unwrap();
        assert_eq!(col.differences, 3);
        assert!(col.degenerate);
        assert!(!col.is_stationary);
        assert_eq!(report.panel.nrows(), 37);
    }

    #[test]
    fn missing_column_is_an_error() {
        let p = panel(vec![("a", noise(30, 1))]);
        assert!(matches!(
            StationarityAnalyzer::default().analyze(&p, &["b"]),
            Err(ForecastError::MissingColumn(_))
        ));
    }
}
