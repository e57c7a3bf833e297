//! Moment estimation: spectral windows, single-gate estimators, clutter
//! detection and filtering, and the per-beam manager tying them together.

pub mod clutfilter;
pub mod clutprob;
pub mod estimator;
pub mod kdp;
pub mod manager;
pub mod window;

pub use clutfilter::{ClutFilter, ClutFilterResult};
pub use clutprob::{ClutProb, ClutterProbe};
pub use estimator::{GateSpectrum, MomentSample, SpectralEstimator, SpectralMoments};
pub use kdp::compute_kdp;
pub use manager::{mean_velocity, BeamSpectra, GateSpectra, MomentsManager};
pub use window::Taper;
