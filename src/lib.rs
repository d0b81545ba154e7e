//! `linefit` library crate.
//!
//! Per-pixel spectral line-profile fitting for 3D data cubes `[channel, x, y]`:
//!
//! - one- or two-component gaussian/bell profiles along the velocity axis
//! - two components combined by superposition or occlusion (upper surface wins)
//! - noise masking, fallback from two to one component, hot-pixel detection and
//!   neighbourhood repair
//! - forward reconstruction of fitted maps into synthetic cubes
//!
//! Reading and writing cube files, plotting and unit conversion belong to the
//! caller. The crate logs through the `log` facade and never installs a logger.

pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod report;
