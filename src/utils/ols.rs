//! Ordinary least squares via Householder QR.
//!
//! Used by the linear lag regressor, the ADF regression and the trend /
//! exogenous step of SARIMA. Columns that are numerically collinear with
//! earlier ones are dropped (coefficient 0) instead of failing the fit.

use crate::error::{ForecastError, Result};

/// Relative tolerance below which a column is treated as collinear.
const RANK_TOLERANCE: f64 = 1e-10;

/// Fitted OLS coefficients and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    /// One coefficient per regressor; dropped columns have 0.
    pub coefficients: Vec<f64>,
    /// Intercept (0 when fitted without one).
    pub intercept: f64,
    /// Standard errors of `coefficients`; `NaN` for dropped columns or
    /// when there are no residual degrees of freedom.
    pub std_errors: Vec<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Number of observations.
    pub n_obs: usize,
    /// Number of estimated parameters, intercept included.
    pub rank: usize,
}

impl OlsFit {
    /// Prediction for a single feature row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    pub fn num_regressors(&self) -> usize {
        self.coefficients.len()
    }

    /// Residual variance estimate `rss / (n - rank)`.
    pub fn sigma2(&self) -> f64 {
        if self.n_obs > self.rank {
            self.rss / (self.n_obs - self.rank) as f64
        } else {
            f64::NAN
        }
    }
}

/// Fit `y = intercept + rows · coefficients`.
///
/// `rows` is row-major: one inner vector per observation, all the same width.
pub fn ols_fit(rows: &[Vec<f64>], y: &[f64], fit_intercept: bool) -> Result<OlsFit> {
    let n = y.len();
    if n == 0 {
        return Err(ForecastError::EmptyData);
    }
    if rows.len() != n {
        return Err(ForecastError::DimensionMismatch {
            expected: n,
            got: rows.len(),
        });
    }
    let k = rows.first().map_or(0, |r| r.len());
    if let Some(bad) = rows.iter().find(|r| r.len() != k) {
        return Err(ForecastError::DimensionMismatch {
            expected: k,
            got: bad.len(),
        });
    }
    if y.iter().chain(rows.iter().flatten()).any(|v| !v.is_finite()) {
        return Err(ForecastError::InvalidParameter(
            "OLS input contains non-finite values".into(),
        ));
    }

    // Column-major working copy, centered when an intercept is fitted.
    let x_mean: Vec<f64> = (0..k)
        .map(|j| {
            if fit_intercept {
                rows.iter().map(|r| r[j]).sum::<f64>() / n as f64
            } else {
                0.0
            }
        })
        .collect();
    let y_mean = if fit_intercept {
        y.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };

    let mut a: Vec<Vec<f64>> = (0..k)
        .map(|j| rows.iter().map(|r| r[j] - x_mean[j]).collect())
        .collect();
    let mut qty: Vec<f64> = y.iter().map(|v| v - y_mean).collect();

    // Householder triangularization. `pivot_row[j]` is the R row of column j,
    // or None when the column was dropped.
    let mut pivot_row: Vec<Option<usize>> = vec![None; k];
    let mut r = 0usize;
    for j in 0..k {
        if r >= n {
            break;
        }
        let col_norm = a[j].iter().map(|v| v * v).sum::<f64>().sqrt();
        let tail_norm = a[j][r..].iter().map(|v| v * v).sum::<f64>().sqrt();
        if col_norm == 0.0 || tail_norm <= RANK_TOLERANCE * col_norm.max(1.0) {
            continue;
        }

        let alpha = if a[j][r] > 0.0 { -tail_norm } else { tail_norm };
        let mut v: Vec<f64> = a[j][r..].to_vec();
        v[0] -= alpha;
        let v_norm2: f64 = v.iter().map(|x| x * x).sum();
        if v_norm2 > 0.0 {
            for col in a.iter_mut().skip(j) {
                reflect(&v, v_norm2, &mut col[r..]);
            }
            reflect(&v, v_norm2, &mut qty[r..]);
        }
        pivot_row[j] = Some(r);
        r += 1;
    }

    // Back substitution over the active columns.
    let mut beta = vec![0.0; k];
    for j in (0..k).rev() {
        let Some(row) = pivot_row[j] else { continue };
        let mut acc = qty[row];
        for l in (j + 1)..k {
            if pivot_row[l].is_some() {
                acc -= a[l][row] * beta[l];
            }
        }
        beta[j] = acc / a[j][row];
    }

    let intercept = if fit_intercept {
        y_mean - beta.iter().zip(&x_mean).map(|(b, m)| b * m).sum::<f64>()
    } else {
        0.0
    };

    let rss: f64 = rows
        .iter()
        .zip(y)
        .map(|(row, &yi)| {
            let fit = intercept + beta.iter().zip(row).map(|(b, x)| b * x).sum::<f64>();
            (yi - fit).powi(2)
        })
        .sum();

    let active: Vec<usize> = (0..k).filter(|&j| pivot_row[j].is_some()).collect();
    let rank = active.len() + usize::from(fit_intercept);
    let sigma2 = if n > rank {
        rss / (n - rank) as f64
    } else {
        f64::NAN
    };

    // diag((R^T R)^-1) = squared row norms of R^-1.
    let m = active.len();
    // Active column i owns R row i.
    let r_at = |i: usize, jj: usize| -> f64 { a[active[jj]][i] };
    let mut r_inv = vec![vec![0.0; m]; m];
    for c in 0..m {
        for i in (0..=c).rev() {
            let mut acc = if i == c { 1.0 } else { 0.0 };
            for l in (i + 1)..=c {
                acc -= r_at(i, l) * r_inv[l][c];
            }
            r_inv[i][c] = acc / r_at(i, i);
        }
    }

    let mut std_errors = vec![f64::NAN; k];
    for (i, &col) in active.iter().enumerate() {
        let var = r_inv[i].iter().map(|v| v * v).sum::<f64>() * sigma2;
        std_errors[col] = var.sqrt();
    }

    Ok(OlsFit {
        coefficients: beta,
        intercept,
        std_errors,
        rss,
        n_obs: n,
        rank,
    })
}

/// Residuals `y - fit.predict(rows)`.
pub fn ols_residuals(fit: &OlsFit, rows: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    rows.iter()
        .zip(y)
        .map(|(row, yi)| yi - fit.predict_row(row))
        .collect()
}

/// Apply `I - 2 v v^T / (v^T v)` to `x` in place.
fn reflect(v: &[f64], v_norm2: f64, x: &mut [f64]) {
    let dot: f64 = v.iter().zip(x.iter()).map(|(a, b)| a * b).sum();
    let scale = 2.0 * dot / v_norm2;
    for (xi, vi) in x.iter_mut().zip(v) {
        *xi -= scale * vi;
    }
}
