//! Line-profile kernels and their two-component combinators.
//!
//! Every function takes the velocity `x` and a flat coefficient slice, so the
//! fitter can treat all of them through one function-pointer type. Slices are
//! laid out `[A, μ, σ]` (gaussian) or `[A, μ, σ, s]` (bell); double variants
//! append the lower component after the upper one.
//!
//! # Panics
//! Panics if `p` is shorter than the kernel arity. Callers size coefficient
//! vectors from [`crate::models::ProfileModel::n_params`].

/// `A·exp(−(x−μ)²/2σ²)`
pub fn gaussian(x: f64, amplitude: f64, centroid: f64, sigma: f64) -> f64 {
    let u = x - centroid;
    amplitude * (-(u * u) / (2.0 * sigma * sigma)).exp()
}

/// `A/(1+|(x−μ)/σ|^(2s))`
pub fn bell(x: f64, amplitude: f64, centroid: f64, sigma: f64, slope: f64) -> f64 {
    let u = ((x - centroid) / sigma).abs();
    amplitude / (1.0 + u.powf(2.0 * slope))
}

/// Channel-wise maximum; the upper value wins ties.
pub fn occlude(upper: f64, lower: f64) -> f64 {
    if upper >= lower { upper } else { lower }
}

pub fn gauss1(x: f64, p: &[f64]) -> f64 {
    gaussian(x, p[0], p[1], p[2])
}

pub fn bell1(x: f64, p: &[f64]) -> f64 {
    bell(x, p[0], p[1], p[2], p[3])
}

pub fn double_gauss_sum(x: f64, p: &[f64]) -> f64 {
    gaussian(x, p[0], p[1], p[2]) + gaussian(x, p[3], p[4], p[5])
}

pub fn double_gauss_mask(x: f64, p: &[f64]) -> f64 {
    occlude(gaussian(x, p[0], p[1], p[2]), gaussian(x, p[3], p[4], p[5]))
}

pub fn double_bell_sum(x: f64, p: &[f64]) -> f64 {
    bell(x, p[0], p[1], p[2], p[3]) + bell(x, p[4], p[5], p[6], p[7])
}

pub fn double_bell_mask(x: f64, p: &[f64]) -> f64 {
    occlude(bell(x, p[0], p[1], p[2], p[3]), bell(x, p[4], p[5], p[6], p[7]))
}
