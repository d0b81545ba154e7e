//! Per-pixel parameter maps and prior-model surfaces.

use ndarray::{Array2, Array3, s};

use crate::domain::types::{KernelKind, KernelParams};
use crate::error::AppError;

/// Value and standard-error map of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMap {
    pub value: Array2<f64>,
    pub error: Array2<f64>,
}

impl ParamMap {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            value: Array2::zeros(shape),
            error: Array2::zeros(shape),
        }
    }
}

/// All parameter maps of one emitting surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaps {
    pub peak: ParamMap,
    pub centroid: ParamMap,
    pub linewidth: ParamMap,
    /// Only present for the bell kernel.
    pub slope: Option<ParamMap>,
}

impl SurfaceMaps {
    pub fn zeros(kernel: KernelKind, shape: (usize, usize)) -> Self {
        Self {
            peak: ParamMap::zeros(shape),
            centroid: ParamMap::zeros(shape),
            linewidth: ParamMap::zeros(shape),
            slope: kernel.has_slope().then(|| ParamMap::zeros(shape)),
        }
    }

    pub fn kernel(&self) -> KernelKind {
        if self.slope.is_some() {
            KernelKind::Bell
        } else {
            KernelKind::Gaussian
        }
    }

    /// `(nx, ny)`
    pub fn shape(&self) -> (usize, usize) {
        self.peak.value.dim()
    }

    fn maps(&self) -> Vec<&ParamMap> {
        let mut out = vec![&self.peak, &self.centroid, &self.linewidth];
        if let Some(slope) = &self.slope {
            out.push(slope);
        }
        out
    }

    fn maps_mut(&mut self) -> Vec<&mut ParamMap> {
        let mut out = vec![&mut self.peak, &mut self.centroid, &mut self.linewidth];
        if let Some(slope) = &mut self.slope {
            out.push(slope);
        }
        out
    }

    pub fn params_at(&self, i: usize, j: usize) -> KernelParams {
        KernelParams {
            amplitude: self.peak.value[(i, j)],
            centroid: self.centroid.value[(i, j)],
            linewidth: self.linewidth.value[(i, j)],
            slope: self.slope.as_ref().map(|m| m.value[(i, j)]),
        }
    }

    /// Parameter `k` (in `[A, μ, σ, (s)]` order) at `(i, j)`.
    pub fn value_at(&self, k: usize, i: usize, j: usize) -> Option<f64> {
        self.maps().get(k).map(|m| m.value[(i, j)])
    }

    /// Write coefficients and their standard errors at `(i, j)`.
    ///
    /// Both slices are in `[A, μ, σ, (s)]` order and must match the kernel arity.
    pub fn set(&mut self, i: usize, j: usize, coeffs: &[f64], errors: &[f64]) {
        for (k, map) in self.maps_mut().into_iter().enumerate() {
            map.value[(i, j)] = coeffs[k];
            map.error[(i, j)] = errors[k];
        }
    }

    /// Reset `(i, j)` to the zero placeholder.
    pub fn clear(&mut self, i: usize, j: usize) {
        for map in self.maps_mut() {
            map.value[(i, j)] = 0.0;
            map.error[(i, j)] = 0.0;
        }
    }

    /// Stack values into a parameter cube `[param, x, y]`.
    pub fn to_parcube(&self) -> Array3<f64> {
        let maps = self.maps();
        let (nx, ny) = self.shape();
        let mut out = Array3::zeros((maps.len(), nx, ny));
        for (k, map) in maps.into_iter().enumerate() {
            out.slice_mut(s![k, .., ..]).assign(&map.value);
        }
        out
    }

    /// Inverse of [`SurfaceMaps::to_parcube`]. Errors are set to zero.
    ///
    /// Three planes mean a gaussian surface, four a bell surface.
    pub fn from_parcube(parcube: &Array3<f64>) -> Result<Self, AppError> {
        let (np, nx, ny) = parcube.dim();
        let kernel = match np {
            3 => KernelKind::Gaussian,
            4 => KernelKind::Bell,
            _ => {
                return Err(AppError::shape(format!(
                    "parameter cube has {np} planes, expected 3 or 4"
                )));
            }
        };
        let mut out = Self::zeros(kernel, (nx, ny));
        for (k, map) in out.maps_mut().into_iter().enumerate() {
            map.value.assign(&parcube.slice(s![k, .., ..]));
        }
        Ok(out)
    }
}

/// Upper (near) and lower (far) surface maps of a two-component fit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMaps {
    pub upper: SurfaceMaps,
    pub lower: SurfaceMaps,
}

impl ParameterMaps {
    pub fn zeros(kernel: KernelKind, shape: (usize, usize)) -> Self {
        Self {
            upper: SurfaceMaps::zeros(kernel, shape),
            lower: SurfaceMaps::zeros(kernel, shape),
        }
    }

    pub fn kernel(&self) -> KernelKind {
        self.upper.kernel()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.upper.shape()
    }

    /// Upper coefficients followed by lower coefficients.
    pub fn coeffs_at(&self, i: usize, j: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(8);
        self.upper.params_at(i, j).extend_coeffs(&mut out);
        self.lower.params_at(i, j).extend_coeffs(&mut out);
        out
    }

    /// Store a two-component result: first half upper, second half lower.
    pub fn set_double(&mut self, i: usize, j: usize, coeffs: &[f64], errors: &[f64]) {
        let half = coeffs.len() / 2;
        self.upper.set(i, j, &coeffs[..half], &errors[..half]);
        self.lower.set(i, j, &coeffs[half..], &errors[half..]);
    }

    /// Store a one-component result in both slots.
    pub fn set_single(&mut self, i: usize, j: usize, coeffs: &[f64], errors: &[f64]) {
        self.upper.set(i, j, coeffs, errors);
        self.lower.set(i, j, coeffs, errors);
    }

    pub fn clear(&mut self, i: usize, j: usize) {
        self.upper.clear(i, j);
        self.lower.clear(i, j);
    }

    /// Upper and lower parameter cubes, each `[param, x, y]`.
    pub fn to_parcubes(&self) -> (Array3<f64>, Array3<f64>) {
        (self.upper.to_parcube(), self.lower.to_parcube())
    }

    /// Build from parameter cubes. A missing lower cube means a zero lower surface.
    pub fn from_parcubes(upper: &Array3<f64>, lower: Option<&Array3<f64>>) -> Result<Self, AppError> {
        let upper = SurfaceMaps::from_parcube(upper)?;
        let lower = match lower {
            Some(cube) => SurfaceMaps::from_parcube(cube)?,
            None => SurfaceMaps::zeros(upper.kernel(), upper.shape()),
        };
        if lower.kernel() != upper.kernel() || lower.shape() != upper.shape() {
            return Err(AppError::shape(format!(
                "lower parameter cube ({} on {:?}) does not match upper ({} on {:?})",
                lower.kernel(),
                lower.shape(),
                upper.kernel(),
                upper.shape()
            )));
        }
        Ok(Self { upper, lower })
    }
}

/// Projected line properties of one surface from a disc model.
///
/// NaN entries mean "undefined here"; seeding falls back to data-derived values.
/// Intensities must already be in the cube's units.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePrior {
    pub intensity: Array2<f64>,
    pub velocity: Array2<f64>,
    pub linewidth: Array2<f64>,
    /// Bell slope; ignored for gaussian fits.
    pub slope: Option<Array2<f64>>,
}

impl SurfacePrior {
    fn check_shape(&self, shape: (usize, usize), label: &str) -> Result<(), AppError> {
        let mut maps = vec![
            ("intensity", &self.intensity),
            ("velocity", &self.velocity),
            ("linewidth", &self.linewidth),
        ];
        if let Some(slope) = &self.slope {
            maps.push(("slope", slope));
        }
        for (name, map) in maps {
            if map.dim() != shape {
                return Err(AppError::shape(format!(
                    "prior {label} {name} map is {:?}, cube is {:?}",
                    map.dim(),
                    shape
                )));
            }
        }
        Ok(())
    }
}

/// Prior-model surfaces used as initial guesses.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscPrior {
    pub upper: SurfacePrior,
    pub lower: SurfacePrior,
}

impl DiscPrior {
    pub fn check_shape(&self, shape: (usize, usize)) -> Result<(), AppError> {
        self.upper.check_shape(shape, "upper")?;
        self.lower.check_shape(shape, "lower")
    }
}
