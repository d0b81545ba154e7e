//! Initial guesses for the optimizer.
//!
//! Two sources:
//!
//! - the data: peak intensity and its channel velocity, a linewidth of a few
//!   channel widths, a default bell slope
//! - a prior disc model: projected per-surface intensity, velocity, linewidth
//!   and slope maps, with NaN entries falling back to data-derived values
//!
//! Prior intensities must already be in the cube's units; no unit conversion
//! happens here.

use ndarray::{Array3, s};

use crate::domain::{DiscPrior, KernelKind, SpectralCube, SurfacePrior};
use crate::error::AppError;

/// Default bell slope seed of the two-component engine.
pub const TWO_COMPONENT_SLOPE: f64 = 1.5;

/// Prior-model fallbacks, used where the prior holds NaN.
const PRIOR_LOWER_AMPLITUDE: f64 = 0.5;
const PRIOR_LINEWIDTH_CHANS: f64 = 1.5;

/// One seed vector per pixel, `[A, μ, σ, (s)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedGrid {
    values: Array3<f64>,
}

impl SeedGrid {
    fn new(kernel: KernelKind, shape: (usize, usize)) -> Self {
        Self {
            values: Array3::zeros((shape.0, shape.1, kernel.n_params())),
        }
    }

    pub fn at(&self, i: usize, j: usize) -> Vec<f64> {
        self.values.slice(s![i, j, ..]).to_vec()
    }

    fn set(&mut self, i: usize, j: usize, seed: &[f64]) {
        for (k, &v) in seed.iter().enumerate() {
            self.values[(i, j, k)] = v;
        }
    }

    /// Seeds from the data alone.
    ///
    /// Amplitude is `amplitude_scale × peak`, centroid the peak-channel velocity,
    /// linewidth `lw_chans × dv` (signed like the axis).
    pub fn from_data(
        cube: &SpectralCube,
        kernel: KernelKind,
        lw_chans: f64,
        amplitude_scale: f64,
        slope: f64,
    ) -> Self {
        let shape = cube.spatial_shape();
        let linewidth = lw_chans * cube.axis().dv();
        let mut grid = Self::new(kernel, shape);
        for i in 0..shape.0 {
            for j in 0..shape.1 {
                let (peak, velocity) = peak_and_velocity(cube, i, j);
                let mut seed = vec![amplitude_scale * peak, velocity, linewidth];
                if kernel.has_slope() {
                    seed.push(slope);
                }
                grid.set(i, j, &seed);
            }
        }
        grid
    }

    fn from_prior(
        cube: &SpectralCube,
        kernel: KernelKind,
        prior: &SurfacePrior,
        fallback_amplitude_scale: f64,
    ) -> Self {
        let shape = cube.spatial_shape();
        let dv = cube.axis().dv();
        let sign = dv.signum();
        let mut grid = Self::new(kernel, shape);
        for i in 0..shape.0 {
            for j in 0..shape.1 {
                let (peak, velocity) = peak_and_velocity(cube, i, j);
                let amplitude = or_fallback(
                    prior.intensity[(i, j)],
                    fallback_amplitude_scale * peak,
                );
                let centroid = or_fallback(prior.velocity[(i, j)], velocity);
                let linewidth = or_fallback(
                    sign * prior.linewidth[(i, j)],
                    PRIOR_LINEWIDTH_CHANS * dv,
                );
                let mut seed = vec![amplitude, centroid, linewidth];
                if kernel.has_slope() {
                    let slope = prior
                        .slope
                        .as_ref()
                        .map(|m| m[(i, j)])
                        .unwrap_or(f64::NAN);
                    seed.push(or_fallback(slope, TWO_COMPONENT_SLOPE));
                }
                grid.set(i, j, &seed);
            }
        }
        grid
    }
}

/// Upper- and lower-surface seeds of the two-component engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Seeds {
    pub upper: SeedGrid,
    pub lower: SeedGrid,
}

impl Seeds {
    /// Data-derived seeds; the lower amplitude is `lower2upper × peak`.
    pub fn from_data(cube: &SpectralCube, kernel: KernelKind, lw_chans: f64, lower2upper: f64) -> Self {
        Self {
            upper: SeedGrid::from_data(cube, kernel, lw_chans, 1.0, TWO_COMPONENT_SLOPE),
            lower: SeedGrid::from_data(cube, kernel, lw_chans, lower2upper, TWO_COMPONENT_SLOPE),
        }
    }

    /// Prior-model seeds.
    ///
    /// Fallbacks where the prior is NaN: upper amplitude = peak, lower amplitude =
    /// half the peak, centroid = peak-channel velocity, linewidth = 1.5 channel
    /// widths, slope = 1.5. Prior linewidths take the sign of the velocity step.
    pub fn from_prior(cube: &SpectralCube, kernel: KernelKind, prior: &DiscPrior) -> Result<Self, AppError> {
        prior.check_shape(cube.spatial_shape())?;
        Ok(Self {
            upper: SeedGrid::from_prior(cube, kernel, &prior.upper, 1.0),
            lower: SeedGrid::from_prior(cube, kernel, &prior.lower, PRIOR_LOWER_AMPLITUDE),
        })
    }

    /// Upper seed followed by lower seed.
    pub fn two_component(&self, i: usize, j: usize) -> Vec<f64> {
        let mut out = self.upper.at(i, j);
        out.extend(self.lower.at(i, j));
        out
    }

    /// Seed of the one-component fallback.
    pub fn one_component(&self, i: usize, j: usize) -> Vec<f64> {
        self.upper.at(i, j)
    }
}

fn peak_and_velocity(cube: &SpectralCube, i: usize, j: usize) -> (f64, f64) {
    match cube.peak(i, j) {
        Some((k, v)) => (v, cube.axis().channels()[k]),
        None => (f64::NAN, f64::NAN),
    }
}

fn or_fallback(value: f64, fallback: f64) -> f64 {
    if value.is_nan() { fallback } else { value }
}
