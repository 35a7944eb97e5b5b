//! Accuracy metrics for hold-out evaluation and grid-search scoring.

use crate::error::{ForecastError, Result};

/// Error metrics between observed and predicted values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// Coefficient of determination. `NaN` when the actuals are constant.
    pub r_squared: f64,
}

/// Compute MAE, MSE, RMSE and R² for paired slices.
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    check_pair(actual, predicted)?;

    let n = actual.len() as f64;
    let (abs_sum, sq_sum) = actual
        .iter()
        .zip(predicted)
        .fold((0.0, 0.0), |(abs, sq), (a, p)| {
            let e = a - p;
            (abs + e.abs(), sq + e * e)
        });

    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - sq_sum / ss_tot
    } else {
        f64::NAN
    };

    let mse = sq_sum / n;
    Ok(AccuracyMetrics {
        mae: abs_sum / n,
        mse,
        rmse: mse.sqrt(),
        r_squared,
    })
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let sq: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok((sq / actual.len() as f64).sqrt())
}

fn check_pair(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if actual.len() != predicted.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }
    Ok(())
}
