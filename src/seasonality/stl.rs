//! STL: seasonal-trend decomposition by LOESS (Cleveland et al., 1990).
//!
//! Additive model `y = trend + seasonal + remainder`. The inner loop
//! alternates cycle-subseries smoothing (seasonal) with LOESS trend
//! smoothing; optional outer loops down-weight large remainders.

use crate::error::{ForecastError, Result};

/// Components returned by [`Stl::decompose`].
#[derive(Debug, Clone, PartialEq)]
pub struct StlComponents {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

impl StlComponents {
    /// Strength of seasonality in `[0, 1]` (Wang, Smith & Hyndman).
    pub fn seasonal_strength(&self) -> f64 {
        strength(&self.seasonal, &self.remainder)
    }

    /// Strength of trend in `[0, 1]`.
    pub fn trend_strength(&self) -> f64 {
        strength(&self.trend, &self.remainder)
    }
}

fn strength(component: &[f64], remainder: &[f64]) -> f64 {
    let combined: Vec<f64> = component.iter().zip(remainder).map(|(c, r)| c + r).collect();
    let var_combined = variance(&combined);
    if var_combined < 1e-12 {
        return 0.0;
    }
    (1.0 - variance(remainder) / var_combined).clamp(0.0, 1.0)
}

/// STL settings. Spans are forced odd.
#[derive(Debug, Clone)]
pub struct Stl {
    period: usize,
    seasonal_span: usize,
    trend_span: usize,
    low_pass_span: usize,
    inner_iterations: usize,
    outer_iterations: usize,
}

impl Stl {
    /// Defaults: seasonal span 7, trend span the smallest odd integer
    /// `≥ 1.5 p / (1 - 1.5 / ns)`, low-pass span the smallest odd `≥ p`.
    pub fn new(period: usize) -> Self {
        let seasonal_span = 7;
        let trend = (1.5 * period as f64 / (1.0 - 1.5 / seasonal_span as f64)).ceil() as usize;
        Self {
            period,
            seasonal_span,
            trend_span: odd(trend),
            low_pass_span: odd(period),
            inner_iterations: 2,
            outer_iterations: 0,
        }
    }

    pub fn with_seasonal_span(mut self, span: usize) -> Self {
        self.seasonal_span = odd(span.max(3));
        self
    }

    pub fn with_trend_span(mut self, span: usize) -> Self {
        self.trend_span = odd(span.max(3));
        self
    }

    /// Enable robustness weighting with `iterations` outer loops.
    pub fn robust(mut self, iterations: usize) -> Self {
        self.outer_iterations = iterations;
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Decompose a fully finite series of at least two periods.
    pub fn decompose(&self, y: &[f64]) -> Result<StlComponents> {
        let n = y.len();
        if self.period < 2 {
            return Err(ForecastError::Decomposition(format!(
                "period must be at least 2, got {}",
                self.period
            )));
        }
        if n < 2 * self.period {
            return Err(ForecastError::Decomposition(format!(
                "need at least {} observations for period {}, got {n}",
                2 * self.period,
                self.period
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Decomposition(
                "series contains non-finite values".into(),
            ));
        }

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut robustness = vec![1.0; n];

        for outer in 0..=self.outer_iterations {
            for _ in 0..self.inner_iterations {
                let detrended: Vec<f64> = y.iter().zip(&trend).map(|(v, t)| v - t).collect();
                let cycle = self.smooth_subseries(&detrended, &robustness);
                let low = self.low_pass(&cycle);
                for i in 0..n {
                    seasonal[i] = cycle[i] - low[i];
                }
                let deseasonalized: Vec<f64> =
                    y.iter().zip(&seasonal).map(|(v, s)| v - s).collect();
                trend = loess(&deseasonalized, self.trend_span, &robustness);
            }

            if outer < self.outer_iterations {
                let remainder: Vec<f64> = (0..n).map(|i| y[i] - trend[i] - seasonal[i]).collect();
                robustness = bisquare_weights(&remainder);
            }
        }

        let remainder = (0..n).map(|i| y[i] - trend[i] - seasonal[i]).collect();
        Ok(StlComponents {
            trend,
            seasonal,
            remainder,
        })
    }

    /// LOESS-smooth each cycle-subseries (all Januaries, all Februaries, ...).
    fn smooth_subseries(&self, detrended: &[f64], robustness: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; detrended.len()];
        for phase in 0..self.period {
            let idx: Vec<usize> = (phase..detrended.len()).step_by(self.period).collect();
            let values: Vec<f64> = idx.iter().map(|&i| detrended[i]).collect();
            let weights: Vec<f64> = idx.iter().map(|&i| robustness[i]).collect();
            let smoothed = loess(&values, self.seasonal_span, &weights);
            for (&i, s) in idx.iter().zip(smoothed) {
                out[i] = s;
            }
        }
        out
    }

    fn low_pass(&self, cycle: &[f64]) -> Vec<f64> {
        let ma = moving_average(&moving_average(&moving_average(cycle, self.period), self.period), 3);
        loess(&ma, self.low_pass_span, &vec![1.0; cycle.len()])
    }
}

impl Default for Stl {
    fn default() -> Self {
        Self::new(12)
    }
}

fn odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Local linear LOESS with tricube weights over `span` nearest positions.
fn loess(values: &[f64], span: usize, robustness: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let q = span.min(n).max(1);

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(q / 2).min(n - q);
            let hi = lo + q;
            let reach = (i - lo).max(hi - 1 - i) as f64 + 1.0;

            let (mut sw, mut sx, mut sy) = (0.0, 0.0, 0.0);
            let mut w = Vec::with_capacity(q);
            for j in lo..hi {
                let u = (j as f64 - i as f64).abs() / reach;
                let wj = (1.0 - u.powi(3)).powi(3) * robustness[j];
                sw += wj;
                sx += wj * j as f64;
                sy += wj * values[j];
                w.push(wj);
            }
            if sw <= 0.0 {
                return values[i];
            }
            let (mx, my) = (sx / sw, sy / sw);
            let (mut sxx, mut sxy) = (0.0, 0.0);
            for (k, j) in (lo..hi).enumerate() {
                let dx = j as f64 - mx;
                sxx += w[k] * dx * dx;
                sxy += w[k] * dx * (values[j] - my);
            }
            if sxx > 1e-12 {
                my + sxy / sxx * (i as f64 - mx)
            } else {
                my
            }
        })
        .collect()
}

/// Centered moving average; windows shrink at the edges.
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            values[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}

fn bisquare_weights(remainder: &[f64]) -> Vec<f64> {
    let mut abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    abs.sort_by(f64::total_cmp);
    let n = abs.len();
    let median = if n % 2 == 0 {
        (abs[n / 2 - 1] + abs[n / 2]) / 2.0
    } else {
        abs[n / 2]
    };
    let h = 6.0 * median;
    remainder
        .iter()
        .map(|r| {
            if h < 1e-12 {
                return 1.0;
            }
            let u = r.abs() / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
}
