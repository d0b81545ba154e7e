//! Two-component engine.
//!
//! Pipeline:
//!
//! - validate the configuration (fatal errors surface here, before any pixel)
//! - noise mask and seeds
//! - initial pass: every unmasked pixel runs the fallback ladder (rows in parallel)
//! - plausibility classification
//! - neighbourhood refinement rounds
//!
//! The caller receives the final maps, the status grid and aggregate counts.

use log::info;
use ndarray::Array2;
use rayon::prelude::*;

use crate::data::NoiseMask;
use crate::domain::{DiscPrior, FitCounts, FitStatus, ParameterMaps, SpectralCube, TwoComponentConfig};
use crate::error::AppError;
use crate::fit::classify::classify;
use crate::fit::pixel::{FallbackLadder, PixelOutcome};
use crate::fit::progress::{ProgressObserver, RowCounter};
use crate::fit::refine::{RoundReport, refine};
use crate::fit::seed::Seeds;
use crate::fit::store::FitStore;
use crate::report::format_two_component_summary;

/// Everything a two-component run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoComponentResult {
    pub maps: ParameterMaps,
    pub status: Array2<FitStatus>,
    /// Counts of the final status grid.
    pub counts: FitCounts,
    /// Counts after the initial pass and its classification.
    pub initial_counts: FitCounts,
    pub rounds: Vec<RoundReport>,
}

impl TwoComponentResult {
    /// Integer status map (Masked −10, Hot −1, Bad 0, Single 1, Double 2).
    pub fn status_codes(&self) -> Array2<i32> {
        self.status.mapv(FitStatus::code)
    }
}

/// Fit two line components at every pixel of `cube`.
///
/// Seeds come from `prior` when given, from the data otherwise.
pub fn fit_two_component(
    cube: &SpectralCube,
    prior: Option<&DiscPrior>,
    config: &TwoComponentConfig,
    progress: &dyn ProgressObserver,
) -> Result<TwoComponentResult, AppError> {
    let model = config.validate()?;
    let kernel = model.kernel();
    let seeds = match prior {
        Some(prior) => Seeds::from_prior(cube, kernel, prior)?,
        None => Seeds::from_data(cube, kernel, config.lw_chans, config.lower2upper),
    };
    let mask = NoiseMask::estimate(cube, config.sigma_thres);
    let ladder = FallbackLadder::new(model, cube.axis(), config.tolerance, config.use_bounds);

    info!(
        "fitting {} ({}) on {}x{} pixels, {} masked",
        model.name(),
        if prior.is_some() { "prior seeds" } else { "data seeds" },
        cube.spatial_shape().0,
        cube.spatial_shape().1,
        mask.count()
    );

    let mut store = FitStore::new(kernel, cube.spatial_shape());
    initial_pass(cube, &mask, &seeds, &ladder, &mut store, progress);

    let cube_max = cube.global_max();
    classify(&mut store, cube_max, cube.axis().dv(), &config.limits);
    let initial_counts = store.counts();
    info!("{}", format_two_component_summary(&initial_counts));

    let rounds = refine(cube, &seeds, &ladder, &mut store, config, cube_max);

    let counts = store.counts();
    if !rounds.is_empty() {
        info!("after refinement: {}", format_two_component_summary(&counts));
    }
    let FitStore { status, maps } = store;
    Ok(TwoComponentResult {
        maps,
        status,
        counts,
        initial_counts,
        rounds,
    })
}

/// Ladder outcome for every pixel; `None` marks a masked pixel.
fn initial_pass(
    cube: &SpectralCube,
    mask: &NoiseMask,
    seeds: &Seeds,
    ladder: &FallbackLadder<'_>,
    store: &mut FitStore,
    progress: &dyn ProgressObserver,
) {
    let (nx, ny) = cube.spatial_shape();
    let counter = RowCounter::start(nx, progress);

    let rows: Vec<Vec<Option<PixelOutcome>>> = (0..nx)
        .into_par_iter()
        .map(|i| {
            let row = (0..ny)
                .map(|j| {
                    if mask.is_masked(i, j) {
                        return None;
                    }
                    let spectrum = cube.spectrum(i, j);
                    Some(ladder.run(
                        &spectrum,
                        &seeds.two_component(i, j),
                        &seeds.one_component(i, j),
                    ))
                })
                .collect();
            counter.row_done();
            row
        })
        .collect();

    for (i, row) in rows.into_iter().enumerate() {
        for (j, outcome) in row.into_iter().enumerate() {
            match outcome {
                Some(outcome) => store.apply(i, j, outcome),
                None => store.mask(i, j),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticSpec, generate};
    use crate::domain::{Combinator, KernelKind, VelocityAxis};
    use crate::fit::progress::NoProgress;
    use crate::models::ProfileModel;
    use ndarray::Array3;
    use std::sync::Mutex;

    #[test]
    fn invalid_configuration_fails_before_fitting() {
        let axis = VelocityAxis::linear(-1.0, 0.5, 5).unwrap();
        let cube = SpectralCube::new(Array3::zeros((5, 2, 2)), axis).unwrap();
        let config = TwoComponentConfig {
            sigma_thres: -1.0,
            ..TwoComponentConfig::default()
        };
        let calls = Mutex::new(0);
        let observer = |_: u8| *calls.lock().unwrap() += 1;
        let err = fit_two_component(&cube, None, &config, &observer).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration(_)));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn flat_cube_is_fully_masked() {
        let axis = VelocityAxis::linear(-3.0, 0.5, 13).unwrap();
        let cube = SpectralCube::new(Array3::zeros((13, 3, 2)), axis).unwrap();
        let seen = Mutex::new(Vec::new());
        let observer = |p: u8| seen.lock().unwrap().push(p);
        let result = fit_two_component(&cube, None, &TwoComponentConfig::default(), &observer).unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.iter().max(), Some(&100));
        assert_eq!(seen.len(), 4);
        assert_eq!(result.counts.masked, 6);
        assert_eq!(result.counts.total(), 6);
        assert!(result.status_codes().iter().all(|c| *c == -10));
    }

    #[test]
    fn statuses_partition_the_grid() {
        let model = ProfileModel::double(KernelKind::Gaussian, Combinator::Sum);
        let spec = SyntheticSpec {
            edge_channels: 5,
            noise_sigma: 0.01,
            seed: 11,
            ..SyntheticSpec::clean(VelocityAxis::linear(-4.0, 0.25, 33).unwrap(), (4, 3))
        };
        let cube = generate(
            &model,
            |i, j| {
                let a = if (i + j) % 3 == 0 { 0.0 } else { 6.0 };
                vec![a, -1.0, 0.6, 0.5 * a, 1.2, 0.8]
            },
            &spec,
        )
        .unwrap();
        let config = TwoComponentConfig {
            kind: Combinator::Sum,
            niter: 1,
            neighs: 1,
            ..TwoComponentConfig::default()
        };
        let result = fit_two_component(&cube, None, &config, &NoProgress).unwrap();
        assert_eq!(result.counts.total(), 12);
        assert_eq!(result.counts, FitCounts::from_status(&result.status));
        assert_eq!(result.rounds.len(), 1);
        // Zero-amplitude pixels are pure noise.
        assert_eq!(result.status[(0, 0)], FitStatus::Masked);
        assert_eq!(result.status[(1, 2)], FitStatus::Masked);
        for ((i, j), s) in result.status.indexed_iter() {
            if *s == FitStatus::Masked || *s == FitStatus::Bad {
                assert_eq!(result.maps.coeffs_at(i, j), vec![0.0; 6]);
            }
        }
    }
}
