//! Input-derived products.
//!
//! - noise estimate and noise mask (`noise`)
//! - synthetic cubes with seeded noise (`synthetic`)

pub mod noise;
pub mod synthetic;

pub use noise::*;
pub use synthetic::*;
