//! Single-pixel fitting.
//!
//! `PixelFitter` wraps one optimizer call: spectrum + seed in, coefficients and
//! standard errors (or a typed failure) out. `FallbackLadder` chains the
//! two-component attempt, the one-component retry and the `Bad` verdict as
//! ordinary `Result` handling.

use log::trace;

use crate::domain::VelocityAxis;
use crate::error::FitFailure;
use crate::math::{Bounds, LmOptions, levenberg_marquardt};
use crate::models::ProfileModel;

/// Converged coefficients and their standard errors (same order).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFit {
    pub coeffs: Vec<f64>,
    pub errors: Vec<f64>,
}

/// Result of the fallback ladder for one pixel.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelOutcome {
    /// Two-component coefficients, upper half first.
    Double(PixelFit),
    /// One-component coefficients.
    Single(PixelFit),
    Bad,
}

/// Amplitudes and slopes non-negative, everything else free.
pub fn physical_bounds(model: &ProfileModel) -> Bounds {
    let per = model.kernel().n_params();
    let mut bounds = Bounds::unbounded(model.n_params());
    for k in (0..model.n_params()).filter(|k| k % per == 0 || k % per == 3) {
        bounds.lower[k] = 0.0;
    }
    bounds
}

/// One optimizer call against a fixed model and velocity axis.
#[derive(Debug, Clone)]
pub struct PixelFitter<'a> {
    model: ProfileModel,
    velocities: &'a [f64],
    opts: LmOptions,
}

impl<'a> PixelFitter<'a> {
    pub fn new(model: ProfileModel, axis: &'a VelocityAxis, opts: LmOptions) -> Self {
        Self {
            model,
            velocities: axis.channels(),
            opts,
        }
    }

    pub fn model(&self) -> &ProfileModel {
        &self.model
    }

    /// Fit `spectrum` from `seed`. `sigma` holds optional per-channel uncertainties.
    pub fn fit(
        &self,
        spectrum: &[f64],
        sigma: Option<&[f64]>,
        seed: &[f64],
    ) -> Result<PixelFit, FitFailure> {
        if seed.len() != self.model.n_params() {
            return Err(FitFailure::SeedLength {
                got: seed.len(),
                expected: self.model.n_params(),
            });
        }
        let model = self.model;
        let sol = levenberg_marquardt(
            |x, p| model.eval(x, p),
            self.velocities,
            spectrum,
            sigma,
            seed,
            &self.opts,
        )?;
        if sol.params.iter().any(|v| !v.is_finite()) {
            return Err(FitFailure::NonFinite);
        }
        Ok(PixelFit {
            coeffs: sol.params,
            errors: sol.std_errors,
        })
    }
}

/// Two-component fit, then one-component fit, then `Bad`.
#[derive(Debug, Clone)]
pub struct FallbackLadder<'a> {
    two: PixelFitter<'a>,
    one: PixelFitter<'a>,
}

impl<'a> FallbackLadder<'a> {
    /// `model` must be a two-component model.
    ///
    /// The two-component rung uses `tolerance`; the one-component rung keeps the
    /// optimizer defaults. With `use_bounds` both rungs project onto
    /// [`physical_bounds`].
    pub fn new(model: ProfileModel, axis: &'a VelocityAxis, tolerance: f64, use_bounds: bool) -> Self {
        let component = model.component();
        let mut two_opts = LmOptions::with_tolerance(tolerance);
        let mut one_opts = LmOptions::default();
        if use_bounds {
            two_opts = two_opts.bounded(physical_bounds(&model));
            one_opts = one_opts.bounded(physical_bounds(&component));
        }
        Self {
            two: PixelFitter::new(model, axis, two_opts),
            one: PixelFitter::new(component, axis, one_opts),
        }
    }

    /// Ladder over caller-built rungs. `two` must fit a two-component model and
    /// `one` its component.
    pub fn from_fitters(two: PixelFitter<'a>, one: PixelFitter<'a>) -> Self {
        Self { two, one }
    }

    pub fn run(&self, spectrum: &[f64], two_seed: &[f64], one_seed: &[f64]) -> PixelOutcome {
        match self.two.fit(spectrum, None, two_seed) {
            Ok(fit) => return PixelOutcome::Double(fit),
            Err(e) => trace!("two-component fit failed: {e}"),
        }
        match self.one.fit(spectrum, None, one_seed) {
            Ok(fit) => PixelOutcome::Single(fit),
            Err(e) => {
                trace!("one-component fit failed: {e}");
                PixelOutcome::Bad
            }
        }
    }
}
