//! Numerical utilities: nonlinear least squares and small statistics.

pub mod lm;
pub mod stats;

pub use lm::*;
pub use stats::*;
