//! Resolved line-profile model.
//!
//! Kernel and combinator are picked once, when configuration is validated, and
//! bound to a plain function pointer. Nothing downstream matches on names again.

use crate::domain::{Combinator, KernelKind};
use crate::error::AppError;
use crate::models::kernel;

/// `f(x, coefficients)`
pub type ProfileFn = fn(f64, &[f64]) -> f64;

/// A kernel, optionally doubled through a combinator, bound to its evaluator.
#[derive(Debug, Clone, Copy)]
pub struct ProfileModel {
    kernel: KernelKind,
    combinator: Option<Combinator>,
    eval: ProfileFn,
}

impl ProfileModel {
    /// One component of `kernel`.
    pub fn single(kernel: KernelKind) -> Self {
        let eval: ProfileFn = match kernel {
            KernelKind::Gaussian => kernel::gauss1,
            KernelKind::Bell => kernel::bell1,
        };
        Self {
            kernel,
            combinator: None,
            eval,
        }
    }

    /// Upper and lower components of `kernel` joined by `combinator`.
    pub fn double(kernel: KernelKind, combinator: Combinator) -> Self {
        let eval: ProfileFn = match (kernel, combinator) {
            (KernelKind::Gaussian, Combinator::Sum) => kernel::double_gauss_sum,
            (KernelKind::Gaussian, Combinator::Mask) => kernel::double_gauss_mask,
            (KernelKind::Bell, Combinator::Sum) => kernel::double_bell_sum,
            (KernelKind::Bell, Combinator::Mask) => kernel::double_bell_mask,
        };
        Self {
            kernel,
            combinator: Some(combinator),
            eval,
        }
    }

    /// Resolve from method/kind names as used in parameter files.
    ///
    /// `method` is one of `gaussian`, `gauss`, `bell`, `doublegaussian`, `dgauss`,
    /// `doublebell` or `dbell`. `kind` (`mask` or `sum`) is only consulted for the
    /// double methods.
    pub fn from_names(method: &str, kind: &str) -> Result<Self, AppError> {
        let method = method.trim().to_ascii_lowercase();
        let double = match method.as_str() {
            "doublegaussian" | "dgauss" => Some(KernelKind::Gaussian),
            "doublebell" | "dbell" => Some(KernelKind::Bell),
            _ => None,
        };
        match double {
            Some(kernel) => Ok(Self::double(kernel, kind.parse()?)),
            None => Ok(Self::single(method.parse()?)),
        }
    }

    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    pub fn combinator(&self) -> Option<Combinator> {
        self.combinator
    }

    pub fn is_double(&self) -> bool {
        self.combinator.is_some()
    }

    /// Coefficient count of the full model.
    pub fn n_params(&self) -> usize {
        let per = self.kernel.n_params();
        if self.is_double() { 2 * per } else { per }
    }

    /// The one-component model of the same kernel.
    pub fn component(&self) -> ProfileModel {
        Self::single(self.kernel)
    }

    #[inline]
    pub fn eval(&self, x: f64, p: &[f64]) -> f64 {
        (self.eval)(x, p)
    }

    /// Evaluate over `xs` into `out` (same length).
    pub fn eval_into(&self, xs: &[f64], p: &[f64], out: &mut [f64]) {
        for (o, &x) in out.iter_mut().zip(xs) {
            *o = (self.eval)(x, p);
        }
    }

    pub fn name(&self) -> String {
        match self.combinator {
            Some(c) => format!("double{}/{}", self.kernel, c),
            None => self.kernel.to_string(),
        }
    }
}
