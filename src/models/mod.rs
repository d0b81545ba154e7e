//! Line-profile models.
//!
//! Kernels are small pure functions; `ProfileModel` binds a kernel (and, for two
//! components, a combinator) so fitting and reconstruction code stay generic.

pub mod kernel;
pub mod profile;

pub use profile::*;
