//! Forward reconstruction and residuals.
//!
//! Reconstruction evaluates stored parameters back through the kernel at every
//! channel and pixel. It is a pure function of (maps, axis, model): no state, no
//! randomness, fixed evaluation order. Pixels without a fit hold zero placeholders
//! and reconstruct to the kernel at those placeholders; residual helpers blank
//! them out with NaN.

use ndarray::{Array2, Array3};

use crate::domain::{FitStatus, OneFitStatus, ParameterMaps, SpectralCube, SurfaceMaps, VelocityAxis};
use crate::error::AppError;
use crate::models::ProfileModel;

/// Synthetic cube from two-component maps.
///
/// `model` must be a two-component model with the maps' kernel.
pub fn reconstruct_two_component(
    model: &ProfileModel,
    maps: &ParameterMaps,
    axis: &VelocityAxis,
) -> Result<SpectralCube, AppError> {
    if !model.is_double() || model.kernel() != maps.kernel() {
        return Err(AppError::config(format!(
            "cannot reconstruct {} maps with {}",
            maps.kernel(),
            model.name()
        )));
    }
    render(model, maps.shape(), axis, |i, j| maps.coeffs_at(i, j))
}

/// Synthetic cube from one surface.
///
/// `model` must be a one-component model with the maps' kernel.
pub fn reconstruct_surface(
    model: &ProfileModel,
    maps: &SurfaceMaps,
    axis: &VelocityAxis,
) -> Result<SpectralCube, AppError> {
    if model.is_double() || model.kernel() != maps.kernel() {
        return Err(AppError::config(format!(
            "cannot reconstruct {} maps with {}",
            maps.kernel(),
            model.name()
        )));
    }
    render(model, maps.shape(), axis, |i, j| maps.params_at(i, j).to_coeffs())
}

fn render<P>(
    model: &ProfileModel,
    (nx, ny): (usize, usize),
    axis: &VelocityAxis,
    params: P,
) -> Result<SpectralCube, AppError>
where
    P: Fn(usize, usize) -> Vec<f64>,
{
    let velocities = axis.channels();
    let mut data = Array3::zeros((velocities.len(), nx, ny));
    let mut spectrum = vec![0.0; velocities.len()];
    for i in 0..nx {
        for j in 0..ny {
            model.eval_into(velocities, &params(i, j), &mut spectrum);
            for (k, v) in spectrum.iter().enumerate() {
                data[(k, i, j)] = *v;
            }
        }
    }
    SpectralCube::new(data, axis.clone())
}

/// `data − model` for two-component results; NaN where the pixel is Masked or Bad.
pub fn two_component_residuals(
    cube: &SpectralCube,
    reconstruction: &SpectralCube,
    status: &Array2<FitStatus>,
) -> Result<Array3<f64>, AppError> {
    let has_fit = status.mapv(|s| !matches!(s, FitStatus::Masked | FitStatus::Bad));
    residuals(cube, reconstruction, &has_fit)
}

/// `data − model` for one-component results; NaN where the pixel is not `Fit`.
pub fn one_component_residuals(
    cube: &SpectralCube,
    reconstruction: &SpectralCube,
    status: &Array2<OneFitStatus>,
) -> Result<Array3<f64>, AppError> {
    let has_fit = status.mapv(|s| s == OneFitStatus::Fit);
    residuals(cube, reconstruction, &has_fit)
}

fn residuals(
    cube: &SpectralCube,
    reconstruction: &SpectralCube,
    has_fit: &Array2<bool>,
) -> Result<Array3<f64>, AppError> {
    let dim = cube.data().dim();
    if reconstruction.data().dim() != dim {
        return Err(AppError::shape(format!(
            "reconstruction is {:?}, cube is {:?}",
            reconstruction.data().dim(),
            dim
        )));
    }
    if has_fit.dim() != (dim.1, dim.2) {
        return Err(AppError::shape(format!(
            "status map is {:?}, cube pixels are {:?}",
            has_fit.dim(),
            (dim.1, dim.2)
        )));
    }
    let mut out = cube.data() - reconstruction.data();
    for ((_, i, j), v) in out.indexed_iter_mut() {
        if !has_fit[(i, j)] {
            *v = f64::NAN;
        }
    }
    Ok(out)
}
