//! Clutter Mitigation Decision: interest maps, the beam window, the
//! fuzzy classifier, and the flag-cleanup filters.

pub mod classifier;
pub mod interest;
pub mod speckle;
pub mod spike;
pub mod window;

pub use classifier::CmdClassifier;
pub use interest::{CmdInterestMaps, InterestMap, InterestSum};
pub use speckle::{fill_flag_gaps, run_speckle_filter};
pub use spike::filter_spikes;
pub use window::BeamWindow;
