//! Reporting utilities: forward reconstruction, residuals and run summaries.

pub mod format;
pub mod reconstruct;

pub use format::*;
pub use reconstruct::*;
