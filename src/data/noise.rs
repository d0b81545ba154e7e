//! Per-pixel noise estimate and noise mask.
//!
//! The first and last few channels of every spectrum are assumed signal-free.
//! Their population standard deviation is the noise level; a pixel whose peak
//! does not exceed `sigma_thres × noise` is masked (equality masks).

use ndarray::{Array2, s};

use crate::domain::SpectralCube;
use crate::math::std_dev;

/// Channels taken from each end of the spectrum for the noise estimate.
pub const EDGE_CHANNELS: usize = 5;

/// Noise level and mask flag per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseMask {
    pub noise: Array2<f64>,
    pub masked: Array2<bool>,
}

impl NoiseMask {
    /// Estimate noise from the edge channels and flag pixels at or below
    /// `sigma_thres × noise`.
    pub fn estimate(cube: &SpectralCube, sigma_thres: f64) -> Self {
        let (nx, ny) = cube.spatial_shape();
        let mut noise = Array2::zeros((nx, ny));
        let mut masked = Array2::from_elem((nx, ny), false);
        for i in 0..nx {
            for j in 0..ny {
                let sigma = edge_noise(cube, i, j);
                noise[(i, j)] = sigma;
                let peak = cube.peak(i, j).map(|(_, v)| v).unwrap_or(f64::NAN);
                masked[(i, j)] = is_masked(peak, sigma, sigma_thres);
            }
        }
        Self { noise, masked }
    }

    pub fn is_masked(&self, i: usize, j: usize) -> bool {
        self.masked[(i, j)]
    }

    pub fn count(&self) -> usize {
        self.masked.iter().filter(|m| **m).count()
    }
}

/// Masking rule. NaN on either side never masks.
pub fn is_masked(peak: f64, noise: f64, sigma_thres: f64) -> bool {
    peak <= sigma_thres * noise
}

/// Standard deviation of the first and last [`EDGE_CHANNELS`] channels.
///
/// On short spectra the two windows overlap and shared channels count twice.
pub fn edge_noise(cube: &SpectralCube, i: usize, j: usize) -> f64 {
    let spectrum = cube.data().slice(s![.., i, j]);
    let n = spectrum.len();
    let k = EDGE_CHANNELS.min(n);
    let mut edges: Vec<f64> = spectrum.iter().take(k).copied().collect();
    edges.extend(spectrum.iter().skip(n - k).copied());
    std_dev(&edges)
}
