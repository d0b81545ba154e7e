//! Spectral cube and its velocity axis.
//!
//! The cube is indexed `[channel, x, y]`. Both types are validated on
//! construction and immutable afterwards.

use ndarray::{Array3, s};

use crate::error::AppError;

/// Monotonic velocity axis, one entry per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityAxis {
    channels: Vec<f64>,
}

impl VelocityAxis {
    /// Validate and wrap channel velocities.
    ///
    /// Requires at least two finite, strictly monotonic entries (either direction).
    pub fn new(channels: Vec<f64>) -> Result<Self, AppError> {
        if channels.len() < 2 {
            return Err(AppError::shape(format!(
                "velocity axis needs at least 2 channels, got {}",
                channels.len()
            )));
        }
        if channels.iter().any(|v| !v.is_finite()) {
            return Err(AppError::shape("velocity axis contains non-finite values"));
        }
        let increasing = channels[1] > channels[0];
        let monotonic = channels.windows(2).all(|w| {
            if increasing {
                w[1] > w[0]
            } else {
                w[1] < w[0]
            }
        });
        if !monotonic {
            return Err(AppError::shape("velocity axis is not strictly monotonic"));
        }
        Ok(Self { channels })
    }

    /// `n` channels starting at `start`, spaced by `step` (may be negative).
    pub fn linear(start: f64, step: f64, n: usize) -> Result<Self, AppError> {
        Self::new((0..n).map(|i| start + step * i as f64).collect())
    }

    pub fn channels(&self) -> &[f64] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Signed mean channel spacing.
    pub fn dv(&self) -> f64 {
        let n = self.channels.len() - 1;
        let total: f64 = self.channels.windows(2).map(|w| w[1] - w[0]).sum();
        total / n as f64
    }
}

/// Intensity cube `[channel, x, y]` paired with its velocity axis.
#[derive(Debug, Clone)]
pub struct SpectralCube {
    data: Array3<f64>,
    axis: VelocityAxis,
}

impl SpectralCube {
    pub fn new(data: Array3<f64>, axis: VelocityAxis) -> Result<Self, AppError> {
        let (nchan, nx, ny) = data.dim();
        if nchan != axis.len() {
            return Err(AppError::shape(format!(
                "cube has {nchan} channels but the velocity axis has {}",
                axis.len()
            )));
        }
        if nx == 0 || ny == 0 {
            return Err(AppError::shape("cube has an empty spatial axis"));
        }
        Ok(Self { data, axis })
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn axis(&self) -> &VelocityAxis {
        &self.axis
    }

    pub fn n_channels(&self) -> usize {
        self.data.dim().0
    }

    /// `(nx, ny)`
    pub fn spatial_shape(&self) -> (usize, usize) {
        let (_, nx, ny) = self.data.dim();
        (nx, ny)
    }

    /// Copy of the spectrum at pixel `(i, j)`.
    pub fn spectrum(&self, i: usize, j: usize) -> Vec<f64> {
        self.data.slice(s![.., i, j]).to_vec()
    }

    /// Channel index and value of the spectrum maximum, ignoring NaNs.
    ///
    /// Ties resolve to the first channel. `None` when every channel is NaN.
    pub fn peak(&self, i: usize, j: usize) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (k, &v) in self.data.slice(s![.., i, j]).iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((k, v)),
            }
        }
        best
    }

    /// Maximum over the whole cube, ignoring NaNs.
    pub fn global_max(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_rejects_non_monotonic_input() {
        assert!(VelocityAxis::new(vec![0.0, 1.0, 0.5]).is_err());
        assert!(VelocityAxis::new(vec![1.0]).is_err());
        assert!(VelocityAxis::new(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn axis_dv_keeps_sign() {
        let axis = VelocityAxis::linear(5.0, -0.25, 9).unwrap();
        assert!((axis.dv() + 0.25).abs() < 1e-12);
        assert_eq!(axis.len(), 9);
        assert!(!axis.is_empty());
    }

    #[test]
    fn cube_checks_channel_count() {
        let axis = VelocityAxis::linear(0.0, 1.0, 4).unwrap();
        assert!(SpectralCube::new(Array3::zeros((3, 2, 2)), axis.clone()).is_err());
        assert!(SpectralCube::new(Array3::zeros((4, 2, 2)), axis).is_ok());
    }

    #[test]
    fn peak_skips_nan_and_takes_first_maximum() {
        let axis = VelocityAxis::linear(0.0, 1.0, 4).unwrap();
        let mut data = Array3::zeros((4, 1, 1));
        data[(0, 0, 0)] = f64::NAN;
        data[(1, 0, 0)] = 3.0;
        data[(2, 0, 0)] = 3.0;
        data[(3, 0, 0)] = 1.0;
        let cube = SpectralCube::new(data, axis).unwrap();
        assert_eq!(cube.peak(0, 0), Some((1, 3.0)));
        assert_eq!(cube.global_max(), 3.0);
    }
}
