//! Seasonal ARIMA with externally supplied orders.

mod diff;
mod sarima;

pub use diff::{difference, differencing_polynomial, integrate, poly_mul};
pub use sarima::{Sarima, SarimaCoefficients, SarimaSpec};
