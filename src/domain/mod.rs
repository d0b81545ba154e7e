//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - the input cube and velocity axis (`SpectralCube`, `VelocityAxis`)
//! - closed configuration enums (`KernelKind`, `Combinator`, `Average`)
//! - per-pixel outcomes (`FitStatus`, `KernelParams`, `ParameterMaps`)
//! - engine configuration (`TwoComponentConfig`, `OneComponentConfig`)

pub mod config;
pub mod cube;
pub mod maps;
pub mod types;

pub use config::*;
pub use cube::*;
pub use maps::*;
pub use types::*;
