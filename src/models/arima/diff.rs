//! Lag polynomials and (seasonal) differencing.
//!
//! A polynomial `c[0] + c[1] B + c[2] B² + …` in the backshift operator is
//! stored as its coefficient vector, lowest power first.

/// Product of two lag polynomials.
pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `(1 - B)^d (1 - B^s)^D`.
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = poly_mul(&poly, &seasonal);
        }
    }
    poly
}

/// Apply a monic differencing polynomial. The output is `poly.len() - 1`
/// shorter than the input; element `i` belongs to input index `i + poly.len() - 1`.
pub fn difference(series: &[f64], poly: &[f64]) -> Vec<f64> {
    let k = poly.len().saturating_sub(1);
    if series.len() <= k {
        return Vec::new();
    }
    (k..series.len())
        .map(|t| poly.iter().enumerate().map(|(j, c)| c * series[t - j]).sum())
        .collect()
}

/// Invert [`difference`] for values appended after `history`.
///
/// Given differenced values `w` for the steps following `history`, return the
/// level values `z_t = w_t - Σ_{j≥1} c_j z_{t-j}`.
pub fn integrate(differenced: &[f64], history: &[f64], poly: &[f64]) -> Vec<f64> {
    let mut levels = history.to_vec();
    for &w in differenced {
        let t = levels.len();
        let carried: f64 = poly
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(j, _)| *j <= t)
            .map(|(j, c)| c * levels[t - j])
            .sum();
        levels.push(w - carried);
    }
    levels.split_off(history.len())
}
