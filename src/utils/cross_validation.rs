//! Chronological splitting for hold-out evaluation and forward-chaining CV.
//!
//! Nothing here shuffles: every training window ends strictly before its
//! test window starts.

use crate::error::{ForecastError, Result};
use std::ops::Range;

/// One train/test split over row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardChainingSplit {
    pub fold: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window splits over `n_samples` rows.
///
/// The last `folds * test_size` rows are cut into `folds` consecutive test
/// blocks of equal size (`test_size = n / (folds + 1)`); each block is
/// preceded by all earlier rows as training data.
pub fn forward_chaining_splits(
    n_samples: usize,
    folds: usize,
    min_train: usize,
) -> Result<Vec<ForwardChainingSplit>> {
    if folds == 0 {
        return Err(ForecastError::InvalidParameter(
            "forward chaining needs at least one fold".into(),
        ));
    }
    let test_size = n_samples / (folds + 1);
    let first_train = n_samples.saturating_sub(folds * test_size);
    if test_size == 0 || first_train < min_train.max(1) {
        return Err(ForecastError::InsufficientHistory {
            needed: (min_train.max(1) + folds).max(folds + 1),
            got: n_samples,
        });
    }

    Ok((0..folds)
        .map(|fold| {
            let start = first_train + fold * test_size;
            ForwardChainingSplit {
                fold,
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}

/// Index at which a chronological train/test split of `n_samples` rows begins
/// its test part. Both parts are non-empty.
pub fn train_test_split_index(n_samples: usize, test_fraction: f64) -> Result<usize> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if n_samples < 2 {
        return Err(ForecastError::InsufficientHistory {
            needed: 2,
            got: n_samples,
        });
    }
    let test_len = ((n_samples as f64) * test_fraction).round() as usize;
    Ok(n_samples - test_len.clamp(1, n_samples - 1))
}
