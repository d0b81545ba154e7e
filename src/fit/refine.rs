//! Neighbourhood refinement of hot and single-component pixels.
//!
//! Each round:
//!
//! - the working set is every `Hot` or `Single` pixel
//! - a pixel is skipped when its `(2n+1)²` window leaves the grid, or when fewer
//!   than half of the window's pixels are clean (`Double`)
//! - otherwise each upper/lower parameter is pooled (median or mean) over the clean
//!   pixels and used as the two-component seed for the usual fallback ladder
//! - the whole grid is reclassified
//!
//! Rounds read a snapshot of the store taken at round start; repairs are computed
//! in parallel and written back when the round ends, so no repair sees another
//! repair of the same round. The round count is fixed.

use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::{Average, FitStatus, SpectralCube, TwoComponentConfig};
use crate::fit::classify::classify;
use crate::fit::pixel::{FallbackLadder, PixelOutcome};
use crate::fit::seed::Seeds;
use crate::fit::store::FitStore;
use crate::math::average;

/// Outcome of one refinement round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    /// 1-based.
    pub round: usize,
    /// Pixels refitted from a neighbourhood seed.
    pub attempted: usize,
    /// Working-set pixels left alone this round.
    pub skipped: usize,
    pub hot: usize,
    pub single: usize,
}

/// Run `config.niter` refinement rounds over `store`.
pub fn refine(
    cube: &SpectralCube,
    seeds: &Seeds,
    ladder: &FallbackLadder<'_>,
    store: &mut FitStore,
    config: &TwoComponentConfig,
    cube_max: f64,
) -> Vec<RoundReport> {
    let dv = cube.axis().dv();
    let mut reports = Vec::with_capacity(config.niter);

    for round in 1..=config.niter {
        let snapshot = &*store;
        let working: Vec<(usize, usize)> = snapshot
            .status
            .indexed_iter()
            .filter(|(_, s)| matches!(s, FitStatus::Hot | FitStatus::Single))
            .map(|(ij, _)| ij)
            .collect();

        let repairs: Vec<((usize, usize), Option<PixelOutcome>)> = working
            .par_iter()
            .map(|&(i, j)| {
                let outcome = neighbourhood_seed(snapshot, i, j, config.neighs, config.average)
                    .map(|seed| ladder.run(&cube.spectrum(i, j), &seed, &seeds.one_component(i, j)));
                ((i, j), outcome)
            })
            .collect();

        let mut attempted = 0;
        for ((i, j), outcome) in repairs {
            match outcome {
                Some(outcome) => {
                    attempted += 1;
                    store.apply(i, j, outcome);
                }
                None => debug!("round {round}: pixel ({i}, {j}) skipped, too few clean neighbours"),
            }
        }

        let hot = classify(store, cube_max, dv, &config.limits);
        let single = store.status.iter().filter(|s| **s == FitStatus::Single).count();
        let report = RoundReport {
            round,
            attempted,
            skipped: working.len() - attempted,
            hot,
            single,
        };
        info!(
            "refinement round {}/{}: {} refitted, {} skipped, {} hot, {} single",
            round, config.niter, report.attempted, report.skipped, report.hot, report.single
        );
        reports.push(report);
    }
    reports
}

/// Pooled two-component seed from the clean pixels around `(i, j)`.
///
/// `None` when the window leaves the grid or is less than half clean.
fn neighbourhood_seed(
    store: &FitStore,
    i: usize,
    j: usize,
    half_width: usize,
    kind: Average,
) -> Option<Vec<f64>> {
    let cells = window(&store.status, i, j, half_width)?;
    let clean: Vec<(usize, usize)> = cells
        .filter(|&ij| store.status[ij] == FitStatus::Double)
        .collect();
    let size = (2 * half_width + 1).pow(2);
    if 2 * clean.len() < size {
        return None;
    }

    let per_pixel: Vec<Vec<f64>> = clean.iter().map(|&(a, b)| store.maps.coeffs_at(a, b)).collect();
    let n = per_pixel.first()?.len();
    let mut column = Vec::with_capacity(per_pixel.len());
    (0..n)
        .map(|k| {
            column.clear();
            column.extend(per_pixel.iter().map(|p| p[k]));
            average(kind, &column)
        })
        .collect()
}

/// Indices of the window around `(i, j)`, centre included.
fn window(
    status: &Array2<FitStatus>,
    i: usize,
    j: usize,
    half_width: usize,
) -> Option<impl Iterator<Item = (usize, usize)>> {
    let (nx, ny) = status.dim();
    if i < half_width || j < half_width || i + half_width >= nx || j + half_width >= ny {
        return None;
    }
    let rows = i - half_width..=i + half_width;
    Some(rows.flat_map(move |a| (j - half_width..=j + half_width).map(move |b| (a, b))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticSpec, generate};
    use crate::domain::{Combinator, KernelKind, VelocityAxis};
    use crate::fit::pixel::PixelFit;
    use crate::models::ProfileModel;

    const TRUTH: [f64; 6] = [6.0, -1.0, 0.7, 4.0, 1.5, 0.9];

    fn setup() -> (SpectralCube, FitStore) {
        let model = ProfileModel::double(KernelKind::Gaussian, Combinator::Mask);
        let spec = SyntheticSpec::clean(VelocityAxis::linear(-5.0, 0.25, 41).unwrap(), (3, 3));
        let cube = generate(&model, |_, _| TRUTH.to_vec(), &spec).unwrap();

        let mut store = FitStore::new(KernelKind::Gaussian, (3, 3));
        for i in 0..3 {
            for j in 0..3 {
                store.apply(
                    i,
                    j,
                    PixelOutcome::Double(PixelFit {
                        coeffs: TRUTH.to_vec(),
                        errors: vec![0.0; 6],
                    }),
                );
            }
        }
        (cube, store)
    }

    fn config(neighs: usize, niter: usize) -> TwoComponentConfig {
        TwoComponentConfig {
            neighs,
            niter,
            ..TwoComponentConfig::default()
        }
    }

    #[test]
    fn window_must_fit_inside_grid() {
        let status = Array2::from_elem((3, 3), FitStatus::Double);
        assert_eq!(window(&status, 1, 1, 1).map(|w| w.count()), Some(9));
        assert!(window(&status, 0, 1, 1).is_none());
        assert!(window(&status, 1, 2, 1).is_none());
        assert!(window(&status, 1, 1, 2).is_none());
    }

    #[test]
    fn pooled_seed_uses_clean_pixels_only() {
        let (_, mut store) = setup();
        store.status[(0, 0)] = FitStatus::Hot;
        store.maps.upper.peak.value[(0, 0)] = 1e6;
        store.maps.upper.peak.value[(0, 1)] = 8.0;
        store.maps.upper.peak.value[(0, 2)] = 9.0;

        let median = neighbourhood_seed(&store, 1, 1, 1, Average::Median).unwrap();
        assert_eq!(median, vec![6.0, -1.0, 0.7, 4.0, 1.5, 0.9]);

        let mean = neighbourhood_seed(&store, 1, 1, 1, Average::Mean).unwrap();
        assert!((mean[0] - (6.0 * 6.0 + 8.0 + 9.0) / 8.0).abs() < 1e-12);
    }

    #[test]
    fn half_clean_window_is_required() {
        let (_, mut store) = setup();
        for (a, b) in [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)] {
            store.status[(a, b)] = FitStatus::Single;
        }
        // 4 of 9 clean.
        assert!(neighbourhood_seed(&store, 1, 1, 1, Average::Median).is_none());
        store.status[(1, 1)] = FitStatus::Hot;
        store.status[(0, 0)] = FitStatus::Double;
        // 5 of 9 clean.
        assert!(neighbourhood_seed(&store, 1, 1, 1, Average::Median).is_some());
    }

    #[test]
    fn narrow_hot_pixel_is_repaired_from_neighbours() {
        let (cube, mut store) = setup();
        // The centre converged to an implausibly narrow upper component.
        store.maps.upper.linewidth.value[(1, 1)] = 0.05;
        let cube_max = cube.global_max();
        let limits = config(1, 1).limits;
        assert_eq!(classify(&mut store, cube_max, cube.axis().dv(), &limits), 1);

        let model = ProfileModel::double(KernelKind::Gaussian, Combinator::Mask);
        let ladder = FallbackLadder::new(model, cube.axis(), 1e-10, false);
        let seeds = Seeds::from_data(&cube, KernelKind::Gaussian, 1.0, 1.0);
        let reports = refine(&cube, &seeds, &ladder, &mut store, &config(1, 2), cube_max);

        assert_eq!(store.status[(1, 1)], FitStatus::Double);
        for (got, want) in store.maps.coeffs_at(1, 1).iter().zip(TRUTH) {
            assert!((got - want).abs() < 1e-9);
        }
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].attempted, 1);
        assert_eq!(reports[0].hot, 0);
        assert_eq!(reports[1].attempted, 0);
    }

    #[test]
    fn single_component_pixel_is_refit_as_double() {
        let (cube, mut store) = setup();
        store.apply(
            1,
            1,
            PixelOutcome::Single(PixelFit {
                coeffs: TRUTH[..3].to_vec(),
                errors: vec![0.0; 3],
            }),
        );
        let model = ProfileModel::double(KernelKind::Gaussian, Combinator::Mask);
        let ladder = FallbackLadder::new(model, cube.axis(), 1e-10, false);
        let seeds = Seeds::from_data(&cube, KernelKind::Gaussian, 1.0, 1.0);
        let reports = refine(&cube, &seeds, &ladder, &mut store, &config(1, 1), cube.global_max());

        assert_eq!(reports[0].attempted, 1);
        assert_eq!(reports[0].single, 0);
        assert_eq!(store.status[(1, 1)], FitStatus::Double);
        assert_eq!(store.maps.coeffs_at(1, 1), TRUTH.to_vec());
    }

    #[test]
    fn edge_pixels_are_skipped() {
        let (cube, mut store) = setup();
        store.status[(0, 0)] = FitStatus::Hot;
        let model = ProfileModel::double(KernelKind::Gaussian, Combinator::Mask);
        let ladder = FallbackLadder::new(model, cube.axis(), 1e-10, false);
        let seeds = Seeds::from_data(&cube, KernelKind::Gaussian, 1.0, 1.0);
        let reports = refine(&cube, &seeds, &ladder, &mut store, &config(1, 3), cube.global_max());
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.attempted == 0 && r.skipped == 1 && r.hot == 1));
        assert_eq!(store.status[(0, 0)], FitStatus::Hot);
    }
}
