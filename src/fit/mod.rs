//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - seed every pixel from the data or from a prior disc model
//! - fit single pixels and walk the two → one component → bad fallback ladder
//! - flag physically implausible fits as hot
//! - repair hot and single-component pixels from their neighbourhood
//! - run the two- and one-component engines over a whole cube (parallel)

pub mod classify;
pub mod one_component;
pub mod pixel;
pub mod progress;
pub mod refine;
pub mod seed;
pub mod store;
pub mod two_component;

pub use classify::*;
pub use one_component::*;
pub use pixel::*;
pub use progress::{LogProgress, NoProgress, ProgressObserver};
pub use refine::*;
pub use seed::*;
pub use store::*;
pub use two_component::*;
