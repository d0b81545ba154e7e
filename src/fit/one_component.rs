//! One-component engine.
//!
//! Same noise mask and non-convergence policy as the two-component engine, but
//! one profile per pixel, no plausibility classification and no refinement.
//! Linewidths are reported as magnitudes.

use log::{info, trace};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;

use crate::data::NoiseMask;
use crate::domain::{OneComponentConfig, OneFitCounts, OneFitStatus, SpectralCube, SurfaceMaps};
use crate::error::AppError;
use crate::fit::pixel::{PixelFit, PixelFitter};
use crate::fit::progress::{ProgressObserver, RowCounter};
use crate::fit::seed::SeedGrid;
use crate::math::LmOptions;
use crate::report::format_one_component_summary;

#[derive(Debug, Clone, PartialEq)]
pub struct OneComponentResult {
    pub maps: SurfaceMaps,
    pub status: Array2<OneFitStatus>,
    pub counts: OneFitCounts,
}

impl OneComponentResult {
    /// Integer status map (Masked −10, Bad 0, Fit 1).
    pub fn status_codes(&self) -> Array2<i32> {
        self.status.mapv(OneFitStatus::code)
    }
}

/// Fit one line profile at every pixel of `cube`.
///
/// `sigma`, when given, holds per-channel uncertainties shaped like the cube
/// (`[channel, x, y]`); residuals are divided by them.
pub fn fit_one_component(
    cube: &SpectralCube,
    sigma: Option<&Array3<f64>>,
    config: &OneComponentConfig,
    progress: &dyn ProgressObserver,
) -> Result<OneComponentResult, AppError> {
    let model = config.validate()?;
    if let Some(sigma) = sigma {
        if sigma.dim() != cube.data().dim() {
            return Err(AppError::shape(format!(
                "sigma array is {:?}, cube is {:?}",
                sigma.dim(),
                cube.data().dim()
            )));
        }
    }

    let kernel = model.kernel();
    let seeds = SeedGrid::from_data(cube, kernel, config.lw_chans, 1.0, config.line_slope);
    let mask = NoiseMask::estimate(cube, config.sigma_thres);
    let fitter = PixelFitter::new(model, cube.axis(), LmOptions::with_tolerance(config.tolerance));
    let (nx, ny) = cube.spatial_shape();
    info!("fitting {} on {nx}x{ny} pixels, {} masked", model.name(), mask.count());

    let counter = RowCounter::start(nx, progress);
    let rows: Vec<Vec<Option<Option<PixelFit>>>> = (0..nx)
        .into_par_iter()
        .map(|i| {
            let row = (0..ny)
                .map(|j| {
                    if mask.is_masked(i, j) {
                        return None;
                    }
                    let spectrum = cube.spectrum(i, j);
                    let weights = sigma.map(|w| w.slice(s![.., i, j]).to_vec());
                    let fit = fitter
                        .fit(&spectrum, weights.as_deref(), &seeds.at(i, j))
                        .inspect_err(|e| trace!("pixel ({i}, {j}): {e}"))
                        .ok();
                    Some(fit)
                })
                .collect();
            counter.row_done();
            row
        })
        .collect();

    let mut maps = SurfaceMaps::zeros(kernel, (nx, ny));
    let mut status = Array2::from_elem((nx, ny), OneFitStatus::Bad);
    for (i, row) in rows.into_iter().enumerate() {
        for (j, outcome) in row.into_iter().enumerate() {
            match outcome {
                None => status[(i, j)] = OneFitStatus::Masked,
                Some(None) => status[(i, j)] = OneFitStatus::Bad,
                Some(Some(mut fit)) => {
                    fit.coeffs[2] = fit.coeffs[2].abs();
                    if !config.peak_kernel {
                        if let Some((_, peak)) = cube.peak(i, j) {
                            fit.coeffs[0] = peak;
                        }
                    }
                    maps.set(i, j, &fit.coeffs, &fit.errors);
                    status[(i, j)] = OneFitStatus::Fit;
                }
            }
        }
    }

    let counts = OneFitCounts::from_status(&status);
    info!("{}", format_one_component_summary(&counts));
    Ok(OneComponentResult { maps, status, counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticSpec, generate};
    use crate::domain::{KernelKind, VelocityAxis};
    use crate::fit::progress::NoProgress;
    use crate::models::ProfileModel;

    fn bell_cube() -> SpectralCube {
        let model = ProfileModel::single(KernelKind::Bell);
        let spec = SyntheticSpec {
            edge_channels: 5,
            noise_sigma: 0.001,
            seed: 3,
            ..SyntheticSpec::clean(VelocityAxis::linear(-3.0, 0.2, 31).unwrap(), (2, 2))
        };
        generate(&model, |i, _| vec![3.0 + i as f64, 0.4, 0.8, 2.5], &spec).unwrap()
    }

    #[test]
    fn bell_profiles_are_recovered() {
        let config = OneComponentConfig {
            method: KernelKind::Bell,
            lw_chans: 3.0,
            ..OneComponentConfig::default()
        };
        let result = fit_one_component(&bell_cube(), None, &config, &NoProgress).unwrap();
        assert_eq!(result.counts.fit, 4);
        let slope = result.maps.slope.as_ref().unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let want = 3.0 + i as f64;
                assert!((result.maps.peak.value[(i, j)] - want).abs() / want < 1e-3);
                assert!((result.maps.centroid.value[(i, j)] - 0.4).abs() < 1e-3);
                assert!((result.maps.linewidth.value[(i, j)] - 0.8).abs() < 1e-3);
                assert!((slope.value[(i, j)] - 2.5).abs() < 1e-2);
            }
        }
    }

    #[test]
    fn raw_peak_replaces_kernel_peak_on_request() {
        let cube = bell_cube();
        let config = OneComponentConfig {
            method: KernelKind::Bell,
            lw_chans: 3.0,
            peak_kernel: false,
            ..OneComponentConfig::default()
        };
        let result = fit_one_component(&cube, None, &config, &NoProgress).unwrap();
        let raw = cube.peak(1, 0).unwrap().1;
        assert_eq!(result.maps.peak.value[(1, 0)], raw);
    }

    #[test]
    fn sigma_shape_is_checked() {
        let cube = bell_cube();
        let sigma = Array3::from_elem((3, 2, 2), 1.0);
        let err = fit_one_component(&cube, Some(&sigma), &OneComponentConfig::default(), &NoProgress)
            .unwrap_err();
        assert!(matches!(err, AppError::ShapeMismatch(_)));
    }

    #[test]
    fn uniform_sigma_leaves_the_fit_unchanged() {
        let cube = bell_cube();
        let config = OneComponentConfig {
            method: KernelKind::Bell,
            lw_chans: 3.0,
            ..OneComponentConfig::default()
        };
        let sigma = Array3::from_elem(cube.data().dim(), 0.5);
        let plain = fit_one_component(&cube, None, &config, &NoProgress).unwrap();
        let weighted = fit_one_component(&cube, Some(&sigma), &config, &NoProgress).unwrap();
        for (a, b) in plain
            .maps
            .centroid
            .value
            .iter()
            .zip(weighted.maps.centroid.value.iter())
        {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
