//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes
//!
//! ```text
//! S(p) = Σ ((y_i - f(x_i, p)) / σ_i)^2
//! ```
//!
//! over `p`, starting from a seed. The Jacobian is built by forward differences.
//! Damping is Marquardt-scaled by `diag(JᵀJ)` and updated with Nielsen's gain
//! ratio.
//!
//! Termination follows the MINPACK tests:
//! - `ftol`: relative actual and predicted reductions of `S` are both small
//! - `xtol`: the step is small relative to `‖p‖`
//! - `gtol`: every Jacobian column is nearly orthogonal to the residuals
//!
//! Exhausting the evaluation budget is reported as `FitFailure::NonConvergence`.
//!
//! Parameters with equal values and identical Jacobian columns are tied: the
//! damped system is solved for one shared step per tie group, so a model made
//! of exchangeable identical components keeps them identical.

use nalgebra::{DMatrix, DVector};

use crate::error::FitFailure;

/// Termination controls.
#[derive(Debug, Clone, PartialEq)]
pub struct LmOptions {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Budget of model evaluations, Jacobian columns included. Building the
    /// Jacobian for the covariance after convergence is not charged.
    ///
    /// `None` means `200·(n+1)` for `n` parameters.
    pub max_evaluations: Option<usize>,
    /// Optional box constraints, applied by projecting every step.
    pub bounds: Option<Bounds>,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self::with_tolerance(1.49012e-8)
    }
}

impl LmOptions {
    /// Same value for ftol, xtol and gtol.
    pub fn with_tolerance(tol: f64) -> Self {
        Self {
            ftol: tol,
            xtol: tol,
            gtol: tol,
            max_evaluations: None,
            bounds: None,
        }
    }

    pub fn bounded(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Per-parameter box `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    fn project(&self, p: &mut [f64]) {
        for (k, v) in p.iter_mut().enumerate() {
            let lo = self.lower.get(k).copied().unwrap_or(f64::NEG_INFINITY);
            let hi = self.upper.get(k).copied().unwrap_or(f64::INFINITY);
            *v = v.clamp(lo, hi);
        }
    }
}

/// Converged solution.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// `sqrt(|diag(cov)|)`; infinite when there are no spare degrees of freedom.
    pub std_errors: Vec<f64>,
    pub covariance: DMatrix<f64>,
    /// Weighted sum of squared residuals at `params`.
    pub ssr: f64,
    pub evaluations: usize,
}

struct Problem<'a, F> {
    f: F,
    x: &'a [f64],
    y: &'a [f64],
    inv_sigma: Vec<f64>,
    evaluations: usize,
}

impl<F> Problem<'_, F>
where
    F: Fn(f64, &[f64]) -> f64,
{
    /// Fill `out` with weighted residuals and return their sum of squares.
    fn residuals(&mut self, p: &[f64], out: &mut DVector<f64>) -> f64 {
        self.evaluations += 1;
        let mut ssr = 0.0;
        for i in 0..self.x.len() {
            let r = (self.y[i] - (self.f)(self.x[i], p)) * self.inv_sigma[i];
            out[i] = r;
            ssr += r * r;
        }
        ssr
    }

    /// Forward-difference Jacobian of the residuals, `∂r/∂p`.
    fn jacobian(&mut self, p: &[f64], r: &DVector<f64>, jac: &mut DMatrix<f64>) {
        let eps = f64::EPSILON.sqrt();
        let mut shifted = p.to_vec();
        let mut r_shift = DVector::zeros(r.len());
        for k in 0..p.len() {
            let mut h = eps * p[k].abs();
            if h == 0.0 {
                h = eps;
            }
            shifted[k] = p[k] + h;
            self.residuals(&shifted, &mut r_shift);
            shifted[k] = p[k];
            let col = (&r_shift - r) / h;
            jac.set_column(k, &col);
        }
    }
}

/// Fit `f` to `(x, y)` from the seed `p0`.
///
/// `sigma`, when given, holds per-point uncertainties; residuals are divided by it.
pub fn levenberg_marquardt<F>(
    f: F,
    x: &[f64],
    y: &[f64],
    sigma: Option<&[f64]>,
    p0: &[f64],
    opts: &LmOptions,
) -> Result<LmSolution, FitFailure>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let m = x.len().min(y.len());
    let n = p0.len();
    if m < n || n == 0 {
        return Err(FitFailure::Underdetermined {
            points: m,
            params: n,
        });
    }

    let inv_sigma = match sigma {
        Some(s) => s.iter().take(m).map(|v| 1.0 / v).collect(),
        None => vec![1.0; m],
    };
    let mut problem = Problem {
        f,
        x: &x[..m],
        y: &y[..m],
        inv_sigma,
        evaluations: 0,
    };
    let max_evaluations = opts.max_evaluations.unwrap_or(200 * (n + 1));

    let mut p = p0.to_vec();
    if let Some(bounds) = &opts.bounds {
        bounds.project(&mut p);
    }
    let mut r = DVector::zeros(m);
    let mut ssr = problem.residuals(&p, &mut r);
    if !ssr.is_finite() {
        return Err(FitFailure::NonFinite);
    }

    let mut jac = DMatrix::zeros(m, n);
    let mut jtj = DMatrix::zeros(n, n);
    let mut grad = DVector::zeros(n);
    let mut ties = Ties::none(n);
    let mut jac_stale = true;
    let mut lambda = 1e-3_f64;
    let mut nu = 2.0_f64;
    let mut r_new = DVector::zeros(m);

    loop {
        if ssr == 0.0 {
            break;
        }

        if jac_stale {
            problem.jacobian(&p, &r, &mut jac);
            if jac.iter().any(|v| !v.is_finite()) {
                return Err(FitFailure::NonFinite);
            }
            jtj = jac.tr_mul(&jac);
            grad = jac.tr_mul(&r);
            ties = Ties::detect(&p, &jac);
            jac_stale = false;

            if max_gradient_cosine(&jac, &grad, ssr.sqrt()) <= opts.gtol {
                break;
            }
        }

        if problem.evaluations >= max_evaluations || !lambda.is_finite() {
            return Err(FitFailure::NonConvergence {
                evaluations: problem.evaluations,
            });
        }

        let scale: Vec<f64> = (0..n).map(|k| jtj[(k, k)].max(1e-12)).collect();
        let (damped, rhs) = ties.reduce(&jtj, &grad, &scale, lambda);
        let Some(chol) = damped.cholesky() else {
            lambda *= nu;
            nu *= 2.0;
            problem.evaluations += 1;
            continue;
        };
        let delta = ties.expand(&chol.solve(&rhs));

        let mut p_new: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
        if let Some(bounds) = &opts.bounds {
            bounds.project(&mut p_new);
        }
        let ssr_new = problem.residuals(&p_new, &mut r_new);

        // Reduction predicted by the linearized model: δ·(λDδ − g).
        let predicted: f64 = (0..n)
            .map(|k| delta[k] * (lambda * scale[k] * delta[k] - grad[k]))
            .sum();
        let step_norm = p
            .iter()
            .zip(&p_new)
            .map(|(a, b)| (b - a) * (b - a))
            .sum::<f64>()
            .sqrt();
        let x_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();

        if ssr_new.is_finite() && ssr_new < ssr && predicted > 0.0 {
            let rho = (ssr - ssr_new) / predicted;
            let actual_rel = (ssr - ssr_new) / ssr;
            let predicted_rel = predicted / ssr;

            p = p_new;
            std::mem::swap(&mut r, &mut r_new);
            ssr = ssr_new;
            jac_stale = true;
            lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;

            if actual_rel.abs() <= opts.ftol && predicted_rel <= opts.ftol && rho <= 2.0 {
                break;
            }
        } else {
            lambda *= nu;
            nu *= 2.0;
        }

        if step_norm <= opts.xtol * (x_norm + opts.xtol) {
            break;
        }
    }

    let evaluations = problem.evaluations;
    if jac_stale {
        problem.jacobian(&p, &r, &mut jac);
    }
    let covariance = covariance(&jac, ssr);
    let std_errors = (0..n).map(|k| covariance[(k, k)].abs().sqrt()).collect();

    Ok(LmSolution {
        params: p,
        std_errors,
        covariance,
        ssr,
        evaluations,
    })
}

/// Tie groups: `group[k]` is the reduced coordinate of parameter `k`.
struct Ties {
    group: Vec<usize>,
    len: usize,
}

impl Ties {
    fn none(n: usize) -> Self {
        Self {
            group: (0..n).collect(),
            len: n,
        }
    }

    /// Tie every parameter to the first earlier one with the same value and the
    /// same Jacobian column.
    fn detect(p: &[f64], jac: &DMatrix<f64>) -> Self {
        let mut group = Vec::with_capacity(p.len());
        let mut leaders: Vec<usize> = Vec::new();
        for k in 0..p.len() {
            let tied = leaders.iter().position(|&l| {
                p[l] == p[k] && jac.column(l).iter().zip(jac.column(k).iter()).all(|(a, b)| a == b)
            });
            match tied {
                Some(g) => group.push(g),
                None => {
                    group.push(leaders.len());
                    leaders.push(k);
                }
            }
        }
        Self {
            group,
            len: leaders.len(),
        }
    }

    /// Damped normal equations `(TᵀJᵀJT + λTᵀDT) d = −Tᵀg` in tied coordinates.
    fn reduce(
        &self,
        jtj: &DMatrix<f64>,
        grad: &DVector<f64>,
        scale: &[f64],
        lambda: f64,
    ) -> (DMatrix<f64>, DVector<f64>) {
        let mut damped = DMatrix::zeros(self.len, self.len);
        let mut rhs = DVector::zeros(self.len);
        for (a, &ga) in self.group.iter().enumerate() {
            rhs[ga] -= grad[a];
            damped[(ga, ga)] += lambda * scale[a];
            for (b, &gb) in self.group.iter().enumerate() {
                damped[(ga, gb)] += jtj[(a, b)];
            }
        }
        (damped, rhs)
    }

    fn expand(&self, reduced: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.group.len(), self.group.iter().map(|&g| reduced[g]))
    }
}

fn max_gradient_cosine(jac: &DMatrix<f64>, grad: &DVector<f64>, r_norm: f64) -> f64 {
    if r_norm == 0.0 {
        return 0.0;
    }
    let mut worst = 0.0_f64;
    for k in 0..jac.ncols() {
        let col_norm = jac.column(k).norm();
        if col_norm > 0.0 {
            worst = worst.max(grad[k].abs() / (col_norm * r_norm));
        }
    }
    worst
}

/// Parameter covariance `pinv(JᵀJ)·SSR/(m−n)`.
///
/// The pseudo-inverse comes from the SVD of `J`; singular values below
/// `eps·max(m,n)·s_max` are dropped so degenerate directions do not blow up the
/// well-determined ones. Without spare degrees of freedom every entry is infinite.
fn covariance(jac: &DMatrix<f64>, ssr: f64) -> DMatrix<f64> {
    let (m, n) = jac.shape();
    if m <= n {
        return DMatrix::from_element(n, n, f64::INFINITY);
    }

    let svd = jac.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return DMatrix::from_element(n, n, f64::INFINITY);
    };
    let s_max = svd.singular_values.max();
    let threshold = f64::EPSILON * m.max(n) as f64 * s_max;

    let mut pcov = DMatrix::zeros(n, n);
    for (k, &s) in svd.singular_values.iter().enumerate() {
        if s > threshold {
            let v = v_t.row(k).transpose();
            pcov += (&v * v.transpose()) / (s * s);
        }
    }
    pcov * (ssr / (m - n) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_decay(x: f64, p: &[f64]) -> f64 {
        p[0] * (-p[1] * x).exp()
    }

    #[test]
    fn recovers_noise_free_exponential() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = x.iter().map(|&v| exp_decay(v, &[3.0, 0.7])).collect();

        let sol = levenberg_marquardt(exp_decay, &x, &y, None, &[1.0, 0.2], &LmOptions::default())
            .unwrap();
        assert!((sol.params[0] - 3.0).abs() < 1e-7, "{:?}", sol.params);
        assert!((sol.params[1] - 0.7).abs() < 1e-7, "{:?}", sol.params);
        assert!(sol.ssr < 1e-12);
    }

    #[test]
    fn exact_seed_converges_immediately() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|&v| exp_decay(v, &[2.0, 0.5])).collect();
        let sol = levenberg_marquardt(exp_decay, &x, &y, None, &[2.0, 0.5], &LmOptions::default())
            .unwrap();
        assert_eq!(sol.params, vec![2.0, 0.5]);
        assert_eq!(sol.std_errors, vec![0.0, 0.0]);
        assert_eq!(sol.evaluations, 1);
    }

    #[test]
    fn too_few_points_is_underdetermined() {
        let err = levenberg_marquardt(exp_decay, &[0.0], &[1.0], None, &[1.0, 1.0], &LmOptions::default())
            .unwrap_err();
        assert_eq!(err, FitFailure::Underdetermined { points: 1, params: 2 });
    }

    #[test]
    fn exhausted_budget_is_non_convergence() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = x.iter().map(|&v| exp_decay(v, &[3.0, 0.7])).collect();
        let opts = LmOptions {
            max_evaluations: Some(4),
            ..LmOptions::default()
        };
        let err = levenberg_marquardt(exp_decay, &x, &y, None, &[1.0, 0.2], &opts).unwrap_err();
        assert!(matches!(err, FitFailure::NonConvergence { .. }));
    }

    #[test]
    fn non_finite_data_is_reported() {
        let x = [0.0, 1.0, 2.0];
        let y = [1.0, f64::NAN, 0.5];
        let err = levenberg_marquardt(exp_decay, &x, &y, None, &[1.0, 0.2], &LmOptions::default())
            .unwrap_err();
        assert_eq!(err, FitFailure::NonFinite);
    }

    #[test]
    fn bounds_keep_parameters_inside_the_box() {
        // Best unconstrained amplitude is 3.0; the box caps it at 2.0.
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&v| exp_decay(v, &[3.0, 0.7])).collect();
        let bounds = Bounds {
            lower: vec![0.0, 0.0],
            upper: vec![2.0, f64::INFINITY],
        };
        let opts = LmOptions::default().bounded(bounds);
        let sol = levenberg_marquardt(exp_decay, &x, &y, None, &[1.0, 0.5], &opts).unwrap();
        assert!(sol.params[0] <= 2.0);
        assert!(sol.params[1] >= 0.0);
    }

    fn two_decays(x: f64, p: &[f64]) -> f64 {
        exp_decay(x, &p[..2]) + exp_decay(x, &p[2..])
    }

    #[test]
    fn exchangeable_components_stay_identical() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = x.iter().map(|&v| two_decays(v, &[2.0, 0.5, 2.0, 0.5])).collect();
        let sol = levenberg_marquardt(two_decays, &x, &y, None, &[1.5, 0.4, 1.5, 0.4], &LmOptions::default())
            .unwrap();
        assert!(sol.evaluations > 1);
        assert_eq!(sol.params[0], sol.params[2]);
        assert_eq!(sol.params[1], sol.params[3]);
        assert!((sol.params[0] - 2.0).abs() < 1e-6, "{:?}", sol.params);
        assert!((sol.params[1] - 0.5).abs() < 1e-6, "{:?}", sol.params);
    }

    #[test]
    fn ties_need_equal_values_and_columns() {
        let jac = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 1.0, 2.0, 2.0, 3.0]);
        let ties = Ties::detect(&[0.5, 0.5, 0.5], &jac);
        assert_eq!(ties.group, vec![0, 0, 1]);
        assert_eq!(ties.len, 2);
        let ties = Ties::detect(&[0.5, 0.6, 0.5], &jac);
        assert_eq!(ties.group, vec![0, 1, 2]);
    }

    #[test]
    fn noisy_fit_has_finite_errors() {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.2).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &v)| exp_decay(v, &[3.0, 0.7]) + if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let sol = levenberg_marquardt(exp_decay, &x, &y, None, &[2.0, 0.5], &LmOptions::default())
            .unwrap();
        assert!(sol.std_errors.iter().all(|e| e.is_finite() && *e > 0.0));
        assert!((sol.params[0] - 3.0).abs() < 0.05);
    }
}
