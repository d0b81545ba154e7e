//! Synthetic spectral cubes.
//!
//! Evaluates a profile model over a pixel grid and optionally adds seeded
//! Gaussian noise. Signal-free channels can be padded onto both ends of the
//! velocity axis (same spacing) so the edge-channel noise estimate sees pure
//! noise. Useful for tests, benchmarks and checking recovery of known parameters.

use ndarray::Array3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{SpectralCube, VelocityAxis};
use crate::error::AppError;
use crate::models::ProfileModel;

/// Layout and noise settings of a synthetic cube.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    /// Velocity axis of the signal channels.
    pub axis: VelocityAxis,
    /// `(nx, ny)`
    pub shape: (usize, usize),
    /// Noise-only channels appended at each end.
    pub edge_channels: usize,
    /// Standard deviation of the additive noise (0 disables it).
    pub noise_sigma: f64,
    /// Add noise to the signal channels too, not only to the padding.
    pub noisy_signal: bool,
    pub seed: u64,
}

impl SyntheticSpec {
    /// Noise-free cube on `axis` without padding.
    pub fn clean(axis: VelocityAxis, shape: (usize, usize)) -> Self {
        Self {
            axis,
            shape,
            edge_channels: 0,
            noise_sigma: 0.0,
            noisy_signal: false,
            seed: 0,
        }
    }
}

/// Render `model` at every pixel with coefficients from `params(i, j)`.
pub fn generate<P>(model: &ProfileModel, params: P, spec: &SyntheticSpec) -> Result<SpectralCube, AppError>
where
    P: Fn(usize, usize) -> Vec<f64>,
{
    if !(spec.noise_sigma.is_finite() && spec.noise_sigma >= 0.0) {
        return Err(AppError::config(format!(
            "noise_sigma must be finite and >= 0, got {}",
            spec.noise_sigma
        )));
    }
    let (nx, ny) = spec.shape;
    let pad = spec.edge_channels;
    let signal = spec.axis.channels();
    let dv = spec.axis.dv();

    let mut channels = Vec::with_capacity(signal.len() + 2 * pad);
    channels.extend((0..pad).rev().map(|k| signal[0] - dv * (k + 1) as f64));
    channels.extend_from_slice(signal);
    let last = signal[signal.len() - 1];
    channels.extend((0..pad).map(|k| last + dv * (k + 1) as f64));
    let axis = VelocityAxis::new(channels)?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise_sigma)
        .map_err(|e| AppError::config(format!("noise distribution error: {e}")))?;
    let noise_on = spec.noise_sigma > 0.0;

    let nchan = axis.len();
    let mut data = Array3::zeros((nchan, nx, ny));
    for i in 0..nx {
        for j in 0..ny {
            let p = params(i, j);
            if p.len() != model.n_params() {
                return Err(AppError::shape(format!(
                    "pixel ({i}, {j}) has {} coefficients, {} expects {}",
                    p.len(),
                    model.name(),
                    model.n_params()
                )));
            }
            for (k, &v) in axis.channels().iter().enumerate() {
                let is_signal = k >= pad && k < pad + signal.len();
                let mut value = if is_signal { model.eval(v, &p) } else { 0.0 };
                if noise_on && (!is_signal || spec.noisy_signal) {
                    value += normal.sample(&mut rng);
                }
                data[(k, i, j)] = value;
            }
        }
    }

    SpectralCube::new(data, axis)
}
