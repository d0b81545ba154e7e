//! Physical plausibility rules (hot pixels).
//!
//! A converged fit is still rejected when, on either surface:
//!
//! - the peak is negative
//! - the peak exceeds `max_peak_factor ×` the cube maximum
//! - the linewidth magnitude is at most `min_linewidth_chans × |dv|`
//! - the linewidth magnitude exceeds `max_linewidth`
//!
//! Two-component fits are also rejected when both centroids are identical.
//! Only `Single` and `Double` pixels are checked; `Hot` stays `Hot` until the
//! refiner refits it.

use std::fmt;

use log::{debug, info};

use crate::domain::{FitStatus, KernelParams, PlausibilityLimits};
use crate::fit::store::FitStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotReason {
    NegativePeak,
    PeakTooLarge,
    CoincidentCentroids,
    TooNarrow,
    TooBroad,
}

impl fmt::Display for HotReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HotReason::NegativePeak => "negative peak",
            HotReason::PeakTooLarge => "peak above cube maximum bound",
            HotReason::CoincidentCentroids => "coincident centroids",
            HotReason::TooNarrow => "linewidth below channel bound",
            HotReason::TooBroad => "linewidth above bound",
        };
        f.write_str(s)
    }
}

/// First rule that `upper`/`lower` violate, if any.
pub fn hot_reason(
    upper: &KernelParams,
    lower: &KernelParams,
    two_component: bool,
    cube_max: f64,
    dv: f64,
    limits: &PlausibilityLimits,
) -> Option<HotReason> {
    let surfaces = [upper, lower];
    if surfaces.iter().any(|p| p.amplitude < 0.0) {
        return Some(HotReason::NegativePeak);
    }
    let max_peak = limits.max_peak_factor * cube_max;
    if surfaces.iter().any(|p| p.amplitude > max_peak) {
        return Some(HotReason::PeakTooLarge);
    }
    if two_component && upper.centroid == lower.centroid {
        return Some(HotReason::CoincidentCentroids);
    }
    let min_width = limits.min_linewidth_chans * dv.abs();
    if surfaces.iter().any(|p| p.linewidth.abs() <= min_width) {
        return Some(HotReason::TooNarrow);
    }
    if surfaces.iter().any(|p| p.linewidth.abs() > limits.max_linewidth) {
        return Some(HotReason::TooBroad);
    }
    None
}

/// Flag implausible `Single`/`Double` pixels as `Hot`; returns the `Hot` count.
pub fn classify(store: &mut FitStore, cube_max: f64, dv: f64, limits: &PlausibilityLimits) -> usize {
    let (nx, ny) = store.shape();
    for i in 0..nx {
        for j in 0..ny {
            let status = store.status[(i, j)];
            if !status.is_converged() {
                continue;
            }
            let upper = store.maps.upper.params_at(i, j);
            let lower = store.maps.lower.params_at(i, j);
            let two_component = status == FitStatus::Double;
            if let Some(reason) = hot_reason(&upper, &lower, two_component, cube_max, dv, limits) {
                debug!("pixel ({i}, {j}) is hot: {reason}");
                store.status[(i, j)] = FitStatus::Hot;
            }
        }
    }
    let hot = store.status.iter().filter(|s| **s == FitStatus::Hot).count();
    info!("hot pixels: {hot}");
    hot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KernelKind;
    use crate::fit::pixel::{PixelFit, PixelOutcome};

    fn g(a: f64, mu: f64, sigma: f64) -> KernelParams {
        KernelParams::gaussian(a, mu, sigma)
    }

    fn reason(upper: KernelParams, lower: KernelParams, two: bool) -> Option<HotReason> {
        hot_reason(&upper, &lower, two, 10.0, 0.2, &PlausibilityLimits::default())
    }

    #[test]
    fn each_rule_fires() {
        assert_eq!(reason(g(5.0, -1.0, 1.0), g(3.0, 1.0, 1.0), true), None);
        assert_eq!(
            reason(g(5.0, -1.0, 1.0), g(-0.1, 1.0, 1.0), true),
            Some(HotReason::NegativePeak)
        );
        assert_eq!(
            reason(g(20.5, -1.0, 1.0), g(3.0, 1.0, 1.0), true),
            Some(HotReason::PeakTooLarge)
        );
        assert_eq!(
            reason(g(5.0, 0.4, 1.0), g(3.0, 0.4, 1.0), true),
            Some(HotReason::CoincidentCentroids)
        );
        // Half a channel (0.1) is still too narrow; the sign is ignored.
        assert_eq!(
            reason(g(5.0, -1.0, -0.1), g(3.0, 1.0, 1.0), true),
            Some(HotReason::TooNarrow)
        );
        assert_eq!(
            reason(g(5.0, -1.0, 1.0), g(3.0, 1.0, 5.5), true),
            Some(HotReason::TooBroad)
        );
    }

    #[test]
    fn coincident_centroids_only_matter_for_two_components() {
        let p = g(5.0, 0.4, 1.0);
        assert_eq!(reason(p, p, false), None);
    }

    #[test]
    fn identical_components_are_flagged() {
        // A two-component fit of a spectrum made of two identical surfaces
        // converges to equal centroids and must be called hot.
        let mut store = FitStore::new(KernelKind::Gaussian, (1, 2));
        let p = vec![4.0, 0.5, 1.0, 4.0, 0.5, 1.0];
        store.apply(
            0,
            0,
            PixelOutcome::Double(PixelFit {
                coeffs: p.clone(),
                errors: vec![0.0; 6],
            }),
        );
        store.apply(
            0,
            1,
            PixelOutcome::Single(PixelFit {
                coeffs: p[..3].to_vec(),
                errors: vec![0.0; 3],
            }),
        );
        let hot = classify(&mut store, 10.0, 0.2, &PlausibilityLimits::default());
        assert_eq!(hot, 1);
        assert_eq!(store.status[(0, 0)], FitStatus::Hot);
        assert_eq!(store.status[(0, 1)], FitStatus::Single);
    }

    #[test]
    fn masked_and_bad_never_become_hot() {
        let mut store = FitStore::new(KernelKind::Gaussian, (1, 2));
        store.mask(0, 0);
        // Zero placeholders would trip the narrow-linewidth rule.
        let hot = classify(&mut store, 10.0, 0.2, &PlausibilityLimits::default());
        assert_eq!(hot, 0);
        assert_eq!(store.status[(0, 0)], FitStatus::Masked);
        assert_eq!(store.status[(0, 1)], FitStatus::Bad);
    }
}
