//! Error types.
//!
//! Two layers:
//!
//! - `AppError` is fatal and surfaces from public entry points. It is raised while
//!   validating configuration and input shapes, before any pixel is touched.
//! - `FitFailure` is per-pixel and recoverable. It never escapes a fitting pass;
//!   the fallback ladder turns it into a status code.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    /// Unknown kernel/combinator name or an out-of-range setting.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Input arrays disagree in shape (cube vs axis, prior vs cube, ...).
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::ShapeMismatch(message.into())
    }
}

/// Why a single optimizer call did not produce usable coefficients.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitFailure {
    #[error("optimizer did not converge within {evaluations} function evaluations")]
    NonConvergence { evaluations: usize },
    #[error("model or residuals became non-finite")]
    NonFinite,
    #[error("{points} data points cannot constrain {params} parameters")]
    Underdetermined { points: usize, params: usize },
    #[error("seed has {got} entries, model expects {expected}")]
    SeedLength { got: usize, expected: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = AppError::config("unknown kernel 'lorentz'");
        assert_eq!(err.to_string(), "invalid configuration: unknown kernel 'lorentz'");

        let fail = FitFailure::NonConvergence { evaluations: 800 };
        assert!(fail.to_string().contains("800"));
    }
}
