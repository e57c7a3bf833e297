pub mod angles;
pub mod fft;
pub mod stats;

pub use angles::{az_diff, condition_az, wrap_angle};
pub use fft::FftHelper;
pub use stats::StatsHelper;
