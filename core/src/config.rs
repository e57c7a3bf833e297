//! Configuration structures for the processing core.
//!
//! Everything here is plain serde-derived data. The simulator loads these
//! from YAML; tests build them directly. Interest-map point lists are kept
//! as specs and validated when [`crate::cmd::CmdInterestMaps`] is built.

use serde::{Deserialize, Serialize};

/// Spectral window applied before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Rect,
    Hanning,
    Blackman,
}

/// Moment estimator selection for a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    PulsePair,
    Fft,
}

/// One operating mode: PRF band, sample count, calibration and algorithm.
///
/// A mode is selected per beam by matching the measured PRF against
/// `[lower_prf, upper_prf]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub n_samples: usize,
    pub lower_prf: f32,
    pub upper_prf: f32,
    pub start_range_km: f32,
    pub gate_spacing_km: f32,
    pub window: WindowKind,
    pub estimator: EstimatorKind,
    pub dual_pol: bool,
    /// When true in dual-pol alternating mode, the per-pulse H/V flag has
    /// inverted sense.
    pub invert_hv_flag: bool,
    /// Fixed calibration noise power, dBm.
    pub noise_dbm: f32,
    /// Total-power censoring threshold above the noise floor, dB.
    pub snr_threshold_db: f32,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            n_samples: 64,
            lower_prf: 900.0,
            upper_prf: 1300.0,
            start_range_km: 0.125,
            gate_spacing_km: 0.25,
            window: WindowKind::Hanning,
            estimator: EstimatorKind::Fft,
            dual_pol: false,
            invert_hv_flag: false,
            noise_dbm: -77.0,
            snr_threshold_db: 3.0,
        }
    }
}

/// Clutter-probe and spectral-filter tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClutterConfig {
    /// Half-width of the clutter search window around zero Doppler, m/s.
    pub max_clutter_vel: f32,
    /// Initial notch half-width, m/s.
    pub init_notch_width: f32,
    /// Inner half-width, in bins, of the DC region for the power ratios.
    pub ratio_inner_bins: usize,
    /// Outer half-width, in bins, of the narrow ratio ring.
    pub ratio_narrow_bins: usize,
    /// Outer half-width, in bins, of the wide ratio ring.
    pub ratio_wide_bins: usize,
    /// Maximum Gaussian-fit passes when filling the notch.
    pub gaussian_fit_passes: usize,
    /// Notch growth follows the raw spectrum while it stays within this
    /// multiple of the fitted Gaussian and keeps decreasing outward.
    pub notch_follow_ratio: f32,
    /// Power-removed threshold, dB, above which the dB-for-dB correction
    /// starts to apply.
    pub db_for_db_threshold: f32,
    /// Proportional correction applied above the threshold.
    pub db_for_db_ratio: f32,
    /// Removed power beyond this, dB, is corrected in full.
    pub db_for_db_wide_threshold: f32,
}

impl Default for ClutterConfig {
    fn default() -> Self {
        Self {
            max_clutter_vel: 1.0,
            init_notch_width: 1.5,
            ratio_inner_bins: 3,
            ratio_narrow_bins: 8,
            ratio_wide_bins: 16,
            gaussian_fit_passes: 3,
            notch_follow_ratio: 1.5,
            db_for_db_threshold: 10.0,
            db_for_db_ratio: 0.15,
            db_for_db_wide_threshold: 40.0,
        }
    }
}

/// A single (value, interest) vertex of a piecewise-linear interest map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImPointSpec {
    pub value: f32,
    pub interest: f32,
}

impl ImPointSpec {
    pub fn new(value: f32, interest: f32) -> Self {
        Self { value, interest }
    }
}

/// One interest map: its vertex list plus the fusion weight.
/// Weight 0 removes the map from fusion entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestMapSpec {
    pub points: Vec<ImPointSpec>,
    pub weight: f32,
}

impl InterestMapSpec {
    pub fn new(points: Vec<(f32, f32)>, weight: f32) -> Self {
        Self {
            points: points
                .into_iter()
                .map(|(v, i)| ImPointSpec::new(v, i))
                .collect(),
            weight,
        }
    }
}

/// Speckle-filter rung: flagged runs of `length` or fewer gates are
/// unflagged wherever the fused score falls below `min_valid_cmd`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpeckleThreshold {
    pub length: usize,
    pub min_valid_cmd: f32,
}

/// CMD classifier configuration: kernel geometry, thresholds and the full
/// interest-map bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmdConfig {
    /// Beam-window width, odd. 1 disables the classifier.
    pub window_width: usize,
    /// Gates at or below this SNR (dB) are excluded from scoring.
    pub snr_threshold_db: f32,
    /// Fused score at or above this flags the gate, subject to the
    /// narrow-ratio corroboration below.
    pub threshold_for_clutter: f32,
    /// Narrowband clutter-power ratio (dB) required alongside the score.
    pub min_ratio_narrow: f32,
    /// Range-kernel length, km, converted to an odd gate count per mode.
    pub kernel_range_km: f32,
    /// Reflectivity step regarded as a spin flip, dB.
    pub spin_dbz_threshold: f32,
    /// Elevation tolerance when gathering kernel beams, deg.
    pub max_elev_diff: f32,
    pub apply_speckle_filter: bool,
    /// Unflagged gaps up to this many gates are infilled when bracketed by
    /// longer flagged runs.
    pub speckle_max_gap: usize,
    pub speckle_thresholds: Vec<SpeckleThreshold>,
    pub apply_spike_filter: bool,

    pub tdbz_map: InterestMapSpec,
    pub spin_map: InterestMapSpec,
    /// Weight of the max(tdbz-interest, spin-interest) composite term.
    pub max_tdbz_spin_weight: f32,
    pub width_map: InterestMapSpec,
    pub wx_peak_sep_map: InterestMapSpec,
    /// Weight of the max(width-interest, peak-separation-interest) term.
    pub max_width_sep_weight: f32,
    pub vel_sdev_map: InterestMapSpec,
    pub zdr_sdev_map: InterestMapSpec,
    pub rhohv_sdev_map: InterestMapSpec,
    pub phidp_sdev_map: InterestMapSpec,
    pub ratio_narrow_map: InterestMapSpec,
    pub ratio_wide_map: InterestMapSpec,
}

impl Default for CmdConfig {
    fn default() -> Self {
        Self {
            window_width: 5,
            snr_threshold_db: 3.0,
            threshold_for_clutter: 0.5,
            min_ratio_narrow: 6.0,
            kernel_range_km: 1.5,
            spin_dbz_threshold: 2.0,
            max_elev_diff: 0.2,
            apply_speckle_filter: true,
            speckle_max_gap: 3,
            speckle_thresholds: vec![
                SpeckleThreshold {
                    length: 3,
                    min_valid_cmd: 0.75,
                },
                SpeckleThreshold {
                    length: 1,
                    min_valid_cmd: 0.6,
                },
            ],
            apply_spike_filter: true,
            tdbz_map: InterestMapSpec::new(
                vec![(0.0, 0.0), (20.0, 0.4), (40.0, 0.8), (60.0, 1.0)],
                1.0,
            ),
            spin_map: InterestMapSpec::new(vec![(0.0, 0.0), (10.0, 0.5), (25.0, 1.0)], 1.0),
            max_tdbz_spin_weight: 1.0,
            width_map: InterestMapSpec::new(
                vec![(0.0, 1.0), (0.5, 0.75), (1.5, 0.25), (3.0, 0.0)],
                1.0,
            ),
            wx_peak_sep_map: InterestMapSpec::new(vec![(0.0, 0.0), (2.0, 0.5), (4.0, 1.0)], 0.5),
            max_width_sep_weight: 0.5,
            vel_sdev_map: InterestMapSpec::new(vec![(0.0, 1.0), (0.7, 0.5), (2.0, 0.0)], 1.0),
            zdr_sdev_map: InterestMapSpec::new(vec![(0.0, 0.0), (1.0, 0.5), (2.0, 1.0)], 1.0),
            rhohv_sdev_map: InterestMapSpec::new(
                vec![(0.0, 0.0), (0.02, 0.3), (0.04, 0.6), (0.08, 1.0)],
                1.0,
            ),
            phidp_sdev_map: InterestMapSpec::new(
                vec![(0.0, 0.0), (10.0, 0.5), (20.0, 1.0)],
                1.0,
            ),
            ratio_narrow_map: InterestMapSpec::new(vec![(0.0, 0.0), (10.0, 0.5), (20.0, 1.0)], 1.0),
            ratio_wide_map: InterestMapSpec::new(vec![(0.0, 0.0), (10.0, 0.5), (20.0, 1.0)], 0.5),
        }
    }
}

/// Top-level radar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub wavelength_cm: f32,
    /// Reflectivity of a signal equal to the noise floor at 1 km, dBZ.
    pub min_dbz_at_1km: f32,
    pub atmos_atten_db_per_km: f32,
    pub index_beams: bool,
    pub az_resolution_deg: f32,
    /// Transmit-path differential phase offset, deg, removed from PHIDP.
    pub system_phidp_deg: f32,
    /// ZDR calibration offset, dB, added to the channel SNR difference.
    pub zdr_correction_db: f32,
    pub modes: Vec<ModeConfig>,
    pub clutter: ClutterConfig,
    pub cmd: CmdConfig,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            wavelength_cm: 10.0,
            min_dbz_at_1km: -34.0,
            atmos_atten_db_per_km: 0.012,
            index_beams: true,
            az_resolution_deg: 1.0,
            system_phidp_deg: 0.0,
            zdr_correction_db: 0.0,
            modes: vec![ModeConfig::default()],
            clutter: ClutterConfig::default(),
            cmd: CmdConfig::default(),
        }
    }
}

impl RadarConfig {
    pub fn wavelength_m(&self) -> f32 {
        self.wavelength_cm / 100.0
    }

    /// Finds the mode whose PRF band contains `prf`, Hz.
    pub fn mode_for_prf(&self, prf: f32) -> Option<(usize, &ModeConfig)> {
        self.modes
            .iter()
            .enumerate()
            .find(|(_, m)| prf >= m.lower_prf && prf <= m.upper_prf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_matches_1000_hz_prf() {
        let config = RadarConfig::default();
        let (index, mode) = config.mode_for_prf(1000.0).unwrap();
        assert_eq!(index, 0);
        assert_eq!(mode.n_samples, 64);
        assert!(config.mode_for_prf(250.0).is_none());
    }

    #[test]
    fn cmd_defaults_have_odd_window() {
        let cmd = CmdConfig::default();
        assert_eq!(cmd.window_width % 2, 1);
        assert!(cmd.threshold_for_clutter > 0.0 && cmd.threshold_for_clutter < 1.0);
    }
}
