//! Seasonal-trend decomposition.
//!
//! - [`Stl`]: the LOESS-based decomposition engine
//! - [`Decomposer`]: applies STL to a monthly series with missing edges

mod decompose;
mod stl;

pub use decompose::{Decomposer, Decomposition};
pub use stl::{Stl, StlComponents};
