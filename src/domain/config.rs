//! Engine configuration.
//!
//! Defaults reproduce the settings the fitting routines have always used.
//! Every struct deserializes with `#[serde(default)]`, so a parameter file only
//! needs to name what it changes. `validate` is the single place where names are
//! resolved and ranges checked; it runs before any pixel is touched.

use serde::{Deserialize, Serialize};

use crate::domain::types::{Average, Combinator, KernelKind};
use crate::error::AppError;
use crate::models::ProfileModel;

/// Thresholds of the physical plausibility rules (hot-pixel detection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityLimits {
    /// A peak above `max_peak_factor × cube maximum` is implausible.
    pub max_peak_factor: f64,
    /// A linewidth at or below this many channel widths is implausible.
    pub min_linewidth_chans: f64,
    /// A linewidth above this (velocity units) is implausible.
    pub max_linewidth: f64,
}

impl Default for PlausibilityLimits {
    fn default() -> Self {
        Self {
            max_peak_factor: 2.0,
            min_linewidth_chans: 0.5,
            max_linewidth: 5.0,
        }
    }
}

impl PlausibilityLimits {
    fn validate(&self) -> Result<(), AppError> {
        positive("limits.max_peak_factor", self.max_peak_factor)?;
        if !(self.min_linewidth_chans.is_finite() && self.min_linewidth_chans >= 0.0) {
            return Err(AppError::config(format!(
                "limits.min_linewidth_chans must be finite and >= 0, got {}",
                self.min_linewidth_chans
            )));
        }
        positive("limits.max_linewidth", self.max_linewidth)
    }
}

/// Settings of the two-component engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoComponentConfig {
    /// Kernel of each component.
    pub method: KernelKind,
    /// How the two components combine.
    pub kind: Combinator,
    /// Data-derived linewidth seed, in channel widths.
    pub lw_chans: f64,
    /// Data-derived lower-surface amplitude seed, as a fraction of the peak.
    pub lower2upper: f64,
    /// Pixels whose peak is `<= sigma_thres × noise` are masked.
    pub sigma_thres: f64,
    /// Number of neighbourhood refinement rounds (0 disables refinement).
    pub niter: usize,
    /// Half-width of the refinement neighbourhood.
    pub neighs: usize,
    /// Pooling of neighbour parameters.
    pub average: Average,
    /// ftol/xtol/gtol of the two-component optimizer.
    pub tolerance: f64,
    /// Project steps onto the physical bounds (amplitude >= 0, slope >= 0).
    pub use_bounds: bool,
    pub limits: PlausibilityLimits,
}

impl Default for TwoComponentConfig {
    fn default() -> Self {
        Self {
            method: KernelKind::Gaussian,
            kind: Combinator::Mask,
            lw_chans: 1.0,
            lower2upper: 1.0,
            sigma_thres: 5.0,
            niter: 4,
            neighs: 5,
            average: Average::Median,
            tolerance: 1e-10,
            use_bounds: false,
            limits: PlausibilityLimits::default(),
        }
    }
}

impl TwoComponentConfig {
    /// Check ranges and resolve the combined profile model.
    pub fn validate(&self) -> Result<ProfileModel, AppError> {
        positive("lw_chans", self.lw_chans)?;
        positive("lower2upper", self.lower2upper)?;
        positive("sigma_thres", self.sigma_thres)?;
        positive("tolerance", self.tolerance)?;
        if self.niter > 0 && self.neighs == 0 {
            return Err(AppError::config("neighs must be >= 1 when refinement is enabled"));
        }
        self.limits.validate()?;
        Ok(ProfileModel::double(self.method, self.kind))
    }
}

/// Settings of the one-component engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneComponentConfig {
    pub method: KernelKind,
    /// Linewidth seed, in channel widths.
    pub lw_chans: f64,
    /// Report the fitted kernel amplitude (true) or the raw spectrum peak (false).
    pub peak_kernel: bool,
    pub sigma_thres: f64,
    /// Bell slope seed.
    pub line_slope: f64,
    /// ftol/xtol/gtol of the optimizer.
    pub tolerance: f64,
}

impl Default for OneComponentConfig {
    fn default() -> Self {
        Self {
            method: KernelKind::Gaussian,
            lw_chans: 1.0,
            peak_kernel: true,
            sigma_thres: 4.0,
            line_slope: 2.0,
            tolerance: 1.49012e-8,
        }
    }
}

impl OneComponentConfig {
    pub fn validate(&self) -> Result<ProfileModel, AppError> {
        positive("lw_chans", self.lw_chans)?;
        positive("sigma_thres", self.sigma_thres)?;
        positive("tolerance", self.tolerance)?;
        if !self.line_slope.is_finite() {
            return Err(AppError::config("line_slope must be finite"));
        }
        Ok(ProfileModel::single(self.method))
    }
}

fn positive(name: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "{name} must be finite and > 0, got {value}"
        )))
    }
}
