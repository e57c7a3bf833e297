//! Core moments pipeline for the radar time-series processor.
//!
//! Pulses enter through a bounded [`pulse::PulseWindow`], beams are assembled
//! around indexed azimuths, and [`moments::MomentsManager`] turns each beam's
//! gate series into calibrated moment fields. The [`cmd`] stage classifies
//! clutter-contaminated gates and drives the spectral clutter filter.

pub mod beam;
pub mod cmd;
pub mod config;
pub mod fields;
pub mod math;
pub mod moments;
pub mod prelude;
pub mod pulse;
pub mod telemetry;

pub use prelude::{is_missing, MomentsError, MomentsResult, MISSING};
