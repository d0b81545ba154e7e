//! Mutable per-pixel state of a two-component run.
//!
//! The store is created by the fitting pass, handed to the classifier and the
//! refiner by `&mut`, and returned to the caller at the end. Parameters are
//! zero placeholders unless the status says the pixel converged.

use ndarray::Array2;

use crate::domain::{FitCounts, FitStatus, KernelKind, ParameterMaps};
use crate::fit::pixel::PixelOutcome;

#[derive(Debug, Clone, PartialEq)]
pub struct FitStore {
    pub status: Array2<FitStatus>,
    pub maps: ParameterMaps,
}

impl FitStore {
    /// Every pixel `Bad` with zero parameters.
    pub fn new(kernel: KernelKind, shape: (usize, usize)) -> Self {
        Self {
            status: Array2::from_elem(shape, FitStatus::Bad),
            maps: ParameterMaps::zeros(kernel, shape),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.status.dim()
    }

    pub fn mask(&mut self, i: usize, j: usize) {
        self.status[(i, j)] = FitStatus::Masked;
        self.maps.clear(i, j);
    }

    /// Record a ladder outcome. `Bad` resets the parameters.
    pub fn apply(&mut self, i: usize, j: usize, outcome: PixelOutcome) {
        match outcome {
            PixelOutcome::Double(fit) => {
                self.status[(i, j)] = FitStatus::Double;
                self.maps.set_double(i, j, &fit.coeffs, &fit.errors);
            }
            PixelOutcome::Single(fit) => {
                self.status[(i, j)] = FitStatus::Single;
                self.maps.set_single(i, j, &fit.coeffs, &fit.errors);
            }
            PixelOutcome::Bad => {
                self.status[(i, j)] = FitStatus::Bad;
                self.maps.clear(i, j);
            }
        }
    }

    pub fn counts(&self) -> FitCounts {
        FitCounts::from_status(&self.status)
    }
}
