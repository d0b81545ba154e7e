//! Shared domain types.
//!
//! These are kept small and serializable so they can be:
//!
//! - used in-memory while fitting
//! - handed to persistence/plotting collaborators unchanged
//! - embedded in configuration files (the closed enums)

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Closed-form line profile shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// `A·exp(−(x−μ)²/2σ²)`
    Gaussian,
    /// `A/(1+|(x−μ)/σ|^(2s))`: flat-topped or peaked depending on the slope `s`.
    Bell,
}

impl KernelKind {
    /// Parameter count of one component.
    pub fn n_params(self) -> usize {
        match self {
            KernelKind::Gaussian => 3,
            KernelKind::Bell => 4,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            KernelKind::Gaussian => "gaussian",
            KernelKind::Bell => "bell",
        }
    }

    pub fn has_slope(self) -> bool {
        matches!(self, KernelKind::Bell)
    }
}

impl FromStr for KernelKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" | "gauss" => Ok(KernelKind::Gaussian),
            "bell" => Ok(KernelKind::Bell),
            other => Err(AppError::config(format!(
                "unknown kernel '{other}' (expected gaussian or bell)"
            ))),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How the upper and lower components combine into one spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Flux superposition.
    Sum,
    /// Occlusion: channel-wise maximum, only the brighter surface is seen.
    Mask,
}

impl Combinator {
    pub fn display_name(self) -> &'static str {
        match self {
            Combinator::Sum => "sum",
            Combinator::Mask => "mask",
        }
    }
}

impl FromStr for Combinator {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Combinator::Sum),
            "mask" => Ok(Combinator::Mask),
            other => Err(AppError::config(format!(
                "unknown combinator '{other}' (expected mask or sum)"
            ))),
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Central-tendency estimator used to pool neighbour parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Average {
    /// Median over finite values.
    #[default]
    Median,
    /// Arithmetic mean over finite values.
    Mean,
}

/// Outcome of the two-component engine for one pixel.
///
/// The integer codes match the maps produced by earlier tooling, so status grids
/// can be compared or persisted as plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStatus {
    /// Peak intensity indistinguishable from noise; never fitted.
    Masked,
    /// Neither the two- nor the one-component fit converged.
    #[default]
    Bad,
    /// Only the one-component fallback converged (both slots hold the same profile).
    Single,
    /// Two-component fit converged.
    Double,
    /// Converged, but the parameters failed a plausibility rule.
    Hot,
}

impl FitStatus {
    pub const ALL: [FitStatus; 5] = [
        FitStatus::Masked,
        FitStatus::Bad,
        FitStatus::Single,
        FitStatus::Double,
        FitStatus::Hot,
    ];

    pub fn code(self) -> i32 {
        match self {
            FitStatus::Masked => -10,
            FitStatus::Hot => -1,
            FitStatus::Bad => 0,
            FitStatus::Single => 1,
            FitStatus::Double => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        FitStatus::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Single or Double: a converged fit that has not been flagged.
    pub fn is_converged(self) -> bool {
        matches!(self, FitStatus::Single | FitStatus::Double)
    }
}

/// Outcome of the one-component engine for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OneFitStatus {
    Masked,
    #[default]
    Bad,
    Fit,
}

impl OneFitStatus {
    pub fn code(self) -> i32 {
        match self {
            OneFitStatus::Masked => -10,
            OneFitStatus::Bad => 0,
            OneFitStatus::Fit => 1,
        }
    }
}

/// Parameters of a single line component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KernelParams {
    pub amplitude: f64,
    pub centroid: f64,
    pub linewidth: f64,
    /// Only present for the bell kernel.
    pub slope: Option<f64>,
}

impl KernelParams {
    pub fn gaussian(amplitude: f64, centroid: f64, linewidth: f64) -> Self {
        Self {
            amplitude,
            centroid,
            linewidth,
            slope: None,
        }
    }

    pub fn bell(amplitude: f64, centroid: f64, linewidth: f64, slope: f64) -> Self {
        Self {
            amplitude,
            centroid,
            linewidth,
            slope: Some(slope),
        }
    }

    /// Build from a coefficient slice laid out `[A, μ, σ, (s)]`.
    ///
    /// Returns `None` unless the slice has 3 or 4 entries.
    pub fn from_coeffs(coeffs: &[f64]) -> Option<Self> {
        match *coeffs {
            [a, mu, sigma] => Some(Self::gaussian(a, mu, sigma)),
            [a, mu, sigma, s] => Some(Self::bell(a, mu, sigma, s)),
            _ => None,
        }
    }

    pub fn kernel(&self) -> KernelKind {
        if self.slope.is_some() {
            KernelKind::Bell
        } else {
            KernelKind::Gaussian
        }
    }

    /// Append `[A, μ, σ, (s)]` to `out`.
    pub fn extend_coeffs(&self, out: &mut Vec<f64>) {
        out.push(self.amplitude);
        out.push(self.centroid);
        out.push(self.linewidth);
        if let Some(s) = self.slope {
            out.push(s);
        }
    }

    pub fn to_coeffs(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(4);
        self.extend_coeffs(&mut out);
        out
    }
}

/// Aggregate outcome counts of the two-component engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FitCounts {
    pub masked: usize,
    pub bad: usize,
    pub single: usize,
    pub double: usize,
    pub hot: usize,
}

impl FitCounts {
    pub fn from_status(status: &Array2<FitStatus>) -> Self {
        let mut counts = FitCounts::default();
        for s in status.iter() {
            match s {
                FitStatus::Masked => counts.masked += 1,
                FitStatus::Bad => counts.bad += 1,
                FitStatus::Single => counts.single += 1,
                FitStatus::Double => counts.double += 1,
                FitStatus::Hot => counts.hot += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.masked + self.bad + self.single + self.double + self.hot
    }
}

/// Aggregate outcome counts of the one-component engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OneFitCounts {
    pub masked: usize,
    pub bad: usize,
    pub fit: usize,
}

impl OneFitCounts {
    pub fn from_status(status: &Array2<OneFitStatus>) -> Self {
        let mut counts = OneFitCounts::default();
        for s in status.iter() {
            match s {
                OneFitStatus::Masked => counts.masked += 1,
                OneFitStatus::Bad => counts.bad += 1,
                OneFitStatus::Fit => counts.fit += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.masked + self.bad + self.fit
    }
}
