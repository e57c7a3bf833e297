//! Per-beam moment computation and clutter filtering.
//!
//! One manager serves one operating mode. It owns the spectral
//! estimators (full-length for single-pol, half-length for dual-pol
//! alternating transmission), the clutter probe and filter, and the
//! lazily rebuilt range-correction table.

use crate::beam::Beam;
use crate::config::{ClutterConfig, EstimatorKind, ModeConfig, RadarConfig};
use crate::moments::clutfilter::ClutFilter;
use crate::moments::clutprob::{ClutProb, ClutterProbe};
use crate::moments::estimator::{GateSpectrum, MomentSample, SpectralEstimator};
use crate::prelude::{is_missing, MomentsError, MomentsResult, MISSING, POWER_EPSILON};
use log::debug;
use num_complex::Complex32;

/// Cached spectra and probe results for one gate, kept between the
/// moments pass and the clutter-filter pass.
#[derive(Default)]
pub struct GateSpectra {
    /// Single-pol spectrum, or the horizontal channel in dual-pol mode.
    pub spectrum: Option<GateSpectrum>,
    pub spectrum_v: Option<GateSpectrum>,
    pub probe: Option<ClutProb>,
}

pub struct BeamSpectra {
    pub gates: Vec<GateSpectra>,
}

pub struct MomentsManager {
    mode: ModeConfig,
    clutter: ClutterConfig,
    wavelength_m: f64,
    min_dbz_at_1km: f32,
    atmos_atten_db_per_km: f32,
    system_phidp_deg: f32,
    zdr_correction_db: f32,
    noise_fixed: f32,
    est_full: SpectralEstimator,
    est_half: Option<SpectralEstimator>,
    probe: ClutterProbe,
    filter: ClutFilter,
    range_corr: Vec<f32>,
}

impl MomentsManager {
    pub fn new(mode: &ModeConfig, radar: &RadarConfig) -> MomentsResult<Self> {
        let wavelength_m = radar.wavelength_m() as f64;
        let est_full = SpectralEstimator::new(
            mode.n_samples,
            wavelength_m,
            mode.window,
            mode.noise_dbm,
            mode.snr_threshold_db,
        )?;
        let est_half = if mode.dual_pol {
            Some(SpectralEstimator::new(
                mode.n_samples / 2,
                wavelength_m,
                mode.window,
                mode.noise_dbm,
                mode.snr_threshold_db,
            )?)
        } else {
            None
        };
        Ok(Self {
            mode: mode.clone(),
            clutter: radar.clutter.clone(),
            wavelength_m,
            min_dbz_at_1km: radar.min_dbz_at_1km,
            atmos_atten_db_per_km: radar.atmos_atten_db_per_km,
            system_phidp_deg: radar.system_phidp_deg,
            zdr_correction_db: radar.zdr_correction_db,
            noise_fixed: 10.0f32.powf(mode.noise_dbm / 10.0),
            est_full,
            est_half,
            probe: ClutterProbe::new(radar.clutter.clone()),
            filter: ClutFilter::new(radar.clutter.clone()),
            range_corr: Vec::new(),
        })
    }

    pub fn mode(&self) -> &ModeConfig {
        &self.mode
    }

    pub fn noise_fixed(&self) -> f32 {
        self.noise_fixed
    }

    pub fn nyquist(&self, prt: f64) -> f64 {
        self.wavelength_m / (4.0 * prt)
    }

    pub fn gate_range_km(&self, gate: usize) -> f32 {
        self.mode.start_range_km + gate as f32 * self.mode.gate_spacing_km
    }

    /// Computes unfiltered moments for every gate of the beam, caching
    /// the spectra on the beam for the later clutter-filter pass.
    pub fn compute_moments(&mut self, beam: &mut Beam) -> MomentsResult<()> {
        if beam.n_samples() != self.mode.n_samples {
            return Err(MomentsError::InvalidInput(format!(
                "beam has {} samples, mode expects {}",
                beam.n_samples(),
                self.mode.n_samples
            )));
        }
        self.ensure_range_corr(beam.n_gates());

        let prt = beam.prt();
        let mut gates = Vec::with_capacity(beam.n_gates());
        for gate in 0..beam.n_gates() {
            let cache = if self.mode.dual_pol {
                self.moments_dual_pol(beam, gate, prt)
            } else {
                self.moments_single_pol(beam, gate, prt)
            };
            gates.push(cache);
        }
        debug!(
            "moments computed: az {:.1} el {:.1} gates {}",
            beam.az(),
            beam.el(),
            beam.n_gates()
        );
        beam.set_spectra(BeamSpectra { gates });
        Ok(())
    }

    fn moments_single_pol(&self, beam: &mut Beam, gate: usize, prt: f64) -> GateSpectra {
        let iq = beam.gate_iq(gate);
        let mut cache = GateSpectra::default();
        let sample = match self.mode.estimator {
            EstimatorKind::PulsePair => self.est_full.compute_by_pulse_pair(&iq, prt),
            EstimatorKind::Fft => {
                let windowed = self.est_full.apply_window(&iq);
                let (sample, spectrum) = self.est_full.compute_by_fft(&windowed, prt);
                let probe = self.probe.analyze(&spectrum.mags, self.nyquist(prt));
                cache.spectrum = Some(spectrum);
                cache.probe = Some(probe);
                sample
            }
        };

        let fields = &mut beam.fields_mut()[gate];
        fields.dbm = power_dbm(sample.power);
        fields.snr = self.snr_db(sample.power);
        if !sample.censored {
            fields.dbz = fields.snr + self.range_corr[gate];
            fields.vel = sample.vel;
            fields.width = sample.width;
        }
        if let Some(probe) = &cache.probe {
            if probe.clutter_found {
                fields.ratio_narrow = probe.ratio_narrow;
                fields.ratio_wide = probe.ratio_wide;
                fields.clut_wx_peak_sep = probe.clut_wx_peak_sep;
            }
        }
        cache
    }

    /// Dual-pol alternating transmission. Each channel is estimated on
    /// its half-length series; half-series velocities and widths come out
    /// in doubled units and are scaled back after combination.
    fn moments_dual_pol(&self, beam: &mut Beam, gate: usize, prt: f64) -> GateSpectra {
        let (iqh, iqv) = beam.gate_iq_hv(gate);
        let mut cache = GateSpectra::default();
        let est = match &self.est_half {
            Some(est) => est,
            None => return cache,
        };

        let (sample_h, sample_v) = match self.mode.estimator {
            EstimatorKind::PulsePair => (
                est.compute_by_pulse_pair(&iqh, prt),
                est.compute_by_pulse_pair(&iqv, prt),
            ),
            EstimatorKind::Fft => {
                let (sh, spec_h) = est.compute_by_fft(&est.apply_window(&iqh), prt);
                let (sv, spec_v) = est.compute_by_fft(&est.apply_window(&iqv), prt);
                let probe = self.probe.analyze(&spec_h.mags, self.nyquist(prt));
                cache.spectrum = Some(spec_h);
                cache.spectrum_v = Some(spec_v);
                cache.probe = Some(probe);
                (sh, sv)
            }
        };

        let mean_power = 0.5 * (sample_h.power + sample_v.power);
        let censored = self.est_full.censored(mean_power);

        let fields = &mut beam.fields_mut()[gate];
        fields.dbm = 0.5 * (power_dbm(sample_h.power) + power_dbm(sample_v.power));
        fields.snr = self.snr_db(mean_power);
        if !censored {
            fields.dbz = fields.snr + self.range_corr[gate];
            // half-series estimates live on the full doubled-unit
            // interval; combine there, then scale back
            let nyquist = self.nyquist(prt) as f32;
            if !is_missing(sample_h.vel) && !is_missing(sample_v.vel) {
                fields.vel = 0.5 * mean_velocity(sample_h.vel, sample_v.vel, nyquist);
            }
            if !is_missing(sample_h.width) && !is_missing(sample_v.width) {
                fields.width = 0.5 * (0.5 * (sample_h.width + sample_v.width));
            }
            self.polarimetric_fields(&iqh, &iqv, sample_h, sample_v, fields);
        }
        if let Some(probe) = &cache.probe {
            if probe.clutter_found {
                fields.ratio_narrow = probe.ratio_narrow;
                fields.ratio_wide = probe.ratio_wide;
                fields.clut_wx_peak_sep = probe.clut_wx_peak_sep;
            }
        }
        cache
    }

    fn polarimetric_fields(
        &self,
        iqh: &[Complex32],
        iqv: &[Complex32],
        sample_h: MomentSample,
        sample_v: MomentSample,
        fields: &mut crate::fields::Fields,
    ) {
        let n = iqh.len().min(iqv.len());
        if n < 3 {
            return;
        }
        // SNR difference rather than raw power difference, so the common
        // noise floor cancels near weak signals
        fields.zdr =
            self.snr_db(sample_h.power) - self.snr_db(sample_v.power) + self.zdr_correction_db;

        // lag-1 cross-channel covariances; the Doppler phase cancels in
        // the conjugate product, leaving twice the differential phase
        let r_hhvv1 = SpectralEstimator::mean_conj_product(&iqv[..n - 1], &iqh[1..n]);
        let r_vvhh1 = SpectralEstimator::mean_conj_product(&iqh[1..n], &iqv[1..n]);
        let psidp = r_vvhh1 * r_hhvv1.conj();

        let system_rad = self.system_phidp_deg.to_radians();
        let offset = Complex32::from_polar(1.0, -2.0 * system_rad);
        let half_angle = 0.5 * (psidp * offset).arg();
        fields.phidp = self.system_phidp_deg + half_angle.to_degrees();

        let p_hh = SpectralEstimator::mean_power(&iqh[1..n]);
        let p_vv = SpectralEstimator::mean_power(&iqv[1..n]);
        if p_hh > POWER_EPSILON && p_vv > POWER_EPSILON {
            let rho_hhvv1 = r_hhvv1.norm() / (p_hh * p_vv).sqrt();
            let r_hhhh2 = SpectralEstimator::mean_conj_product(&iqh[..n - 1], &iqh[1..n]);
            let rho_hh2 = r_hhhh2.norm() / p_hh;
            if rho_hh2 > 0.0 {
                // lag-2 self-term removes Doppler decorrelation bias
                fields.rhohv = (rho_hhvv1 / rho_hh2.powf(0.25)).min(1.0);
            }
        }
    }

    /// Fills the filtered fields. Every gate starts with its filtered
    /// fields equal to the unfiltered ones; only CMD-flagged gates are
    /// re-estimated on a clutter-notched spectrum. Consumes the spectra
    /// cached on the beam by `compute_moments`.
    pub fn filter_clutter(&mut self, beam: &mut Beam) -> MomentsResult<()> {
        let spectra = beam.take_spectra().ok_or_else(|| {
            MomentsError::InvalidInput(
                "beam carries no cached spectra; compute moments first".to_string(),
            )
        })?;
        if spectra.gates.len() != beam.n_gates() {
            return Err(MomentsError::InvalidInput(format!(
                "spectra cache has {} gates, beam has {}",
                spectra.gates.len(),
                beam.n_gates()
            )));
        }
        self.ensure_range_corr(beam.n_gates());
        let prt = beam.prt();
        let nyquist = self.nyquist(prt);

        for gate in 0..beam.n_gates() {
            let flagged = {
                let fields = &mut beam.fields_mut()[gate];
                fields.dbz_filtered = fields.dbz;
                fields.vel_filtered = fields.vel;
                fields.width_filtered = fields.width;
                fields.cmd_flag
            };
            if !flagged {
                continue;
            }
            let cache = &spectra.gates[gate];
            let Some(spectrum) = &cache.spectrum else {
                continue;
            };
            // gates flagged without a detected clutter peak are notched
            // at zero Doppler
            let probe = cache
                .probe
                .as_ref()
                .filter(|p| p.clutter_found)
                .copied()
                .unwrap_or(ClutProb {
                    clutter_found: true,
                    clutter_peak_bin: 0,
                    weather_peak_bin: None,
                    clut_wx_peak_sep: MISSING,
                    ratio_narrow: MISSING,
                    ratio_wide: MISSING,
                });
            if self.mode.dual_pol {
                self.filter_gate_dual(beam, gate, cache, &probe, nyquist);
            } else {
                self.filter_gate_single(beam, gate, spectrum, &probe, nyquist);
            }
        }
        Ok(())
    }

    fn filter_gate_single(
        &self,
        beam: &mut Beam,
        gate: usize,
        spectrum: &GateSpectrum,
        probe: &ClutProb,
        nyquist: f64,
    ) {
        let result = self
            .filter
            .filter(&spectrum.mags, probe, spectrum.measured_noise, nyquist);
        let pwr = mean_spectral_power(&result.mags);
        let corrected = self.db_for_db(pwr, result.power_removed);

        let fields = &mut beam.fields_mut()[gate];
        fields.clut = 10.0
            * (result.power_removed.max(POWER_EPSILON) / corrected.max(POWER_EPSILON)).log10();
        if corrected > self.noise_fixed {
            fields.dbz_filtered = self.snr_db(corrected) + self.range_corr[gate];
            fields.vel_filtered = result.vel;
            fields.width_filtered = result.width;
        } else {
            fields.dbz_filtered = MISSING;
            fields.vel_filtered = MISSING;
            fields.width_filtered = MISSING;
        }
    }

    fn filter_gate_dual(
        &self,
        beam: &mut Beam,
        gate: usize,
        cache: &GateSpectra,
        probe: &ClutProb,
        nyquist: f64,
    ) {
        let (Some(spec_h), Some(spec_v)) = (&cache.spectrum, &cache.spectrum_v) else {
            return;
        };
        let result_h = self
            .filter
            .filter(&spec_h.mags, probe, spec_h.measured_noise, nyquist);
        let result_v = self
            .filter
            .filter(&spec_v.mags, probe, spec_v.measured_noise, nyquist);

        let pwr_h = self.db_for_db(mean_spectral_power(&result_h.mags), result_h.power_removed);
        let pwr_v = self.db_for_db(mean_spectral_power(&result_v.mags), result_v.power_removed);
        let mean_power = 0.5 * (pwr_h + pwr_v);
        let mean_removed = 0.5 * (result_h.power_removed + result_v.power_removed);

        let fields = &mut beam.fields_mut()[gate];
        fields.clut = 10.0
            * (mean_removed.max(POWER_EPSILON) / mean_power.max(POWER_EPSILON)).log10();
        if mean_power > self.noise_fixed {
            fields.dbz_filtered = self.snr_db(mean_power) + self.range_corr[gate];
            fields.vel_filtered =
                0.5 * mean_velocity(result_h.vel, result_v.vel, nyquist as f32);
            fields.width_filtered = 0.5 * (0.5 * (result_h.width + result_v.width));
        } else {
            fields.dbz_filtered = MISSING;
            fields.vel_filtered = MISSING;
            fields.width_filtered = MISSING;
        }
    }

    /// Proportional correction for the apparent noise floor raised by
    /// notching: above the threshold a fraction of the removed power is
    /// charged back, and removal beyond the wide threshold is charged in
    /// full.
    fn db_for_db(&self, pwr: f32, removed: f32) -> f32 {
        if pwr <= 0.0 || removed <= 0.0 {
            return pwr;
        }
        let diff_db = 10.0 * ((pwr + removed) / pwr).log10();
        if diff_db <= self.clutter.db_for_db_threshold {
            return pwr;
        }
        let mut correction_db = diff_db * self.clutter.db_for_db_ratio;
        if diff_db > self.clutter.db_for_db_wide_threshold {
            correction_db += diff_db - self.clutter.db_for_db_wide_threshold;
        }
        pwr / 10.0f32.powf(correction_db / 10.0)
    }

    fn snr_db(&self, power: f32) -> f32 {
        let signal = (power - self.noise_fixed).max(POWER_EPSILON);
        10.0 * (signal / self.noise_fixed).log10()
    }

    fn ensure_range_corr(&mut self, n_gates: usize) {
        if self.range_corr.len() == n_gates {
            return;
        }
        self.range_corr = (0..n_gates)
            .map(|gate| {
                let range_km = self.gate_range_km(gate).max(1.0e-3);
                self.min_dbz_at_1km
                    + 20.0 * range_km.log10()
                    + range_km * self.atmos_atten_db_per_km
            })
            .collect();
    }
}

fn power_dbm(power: f32) -> f32 {
    10.0 * power.max(POWER_EPSILON).log10()
}

fn mean_spectral_power(mags: &[f32]) -> f32 {
    if mags.is_empty() {
        return 0.0;
    }
    let sum: f64 = mags.iter().map(|&m| (m as f64) * (m as f64)).sum();
    (sum / mags.len() as f64) as f32
}

/// Mean of two velocities on a circle of the given Nyquist interval,
/// unwrapping when they sit on opposite sides of the fold.
pub fn mean_velocity(vel1: f32, vel2: f32, nyquist: f32) -> f32 {
    let mut v1 = vel1;
    let mut v2 = vel2;
    if (v1 - v2).abs() < nyquist {
        return 0.5 * (v1 + v2);
    }
    if v1 > v2 {
        v2 += 2.0 * nyquist;
    } else {
        v1 += 2.0 * nyquist;
    }
    let mut mean = 0.5 * (v1 + v2);
    if mean > nyquist {
        mean -= 2.0 * nyquist;
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowKind;
    use crate::pulse::{BeamSlice, Pulse, PulseHeader};
    use std::f64::consts::PI;
    use std::sync::Arc;

    const PRT: f64 = 0.001;
    const WAVELENGTH_M: f64 = 0.10;

    fn radar_config() -> RadarConfig {
        RadarConfig::default()
    }

    fn fft_mode(dual_pol: bool) -> ModeConfig {
        ModeConfig {
            window: WindowKind::Hanning,
            estimator: EstimatorKind::Fft,
            dual_pol,
            ..ModeConfig::default()
        }
    }

    /// Builds a beam whose per-gate series are supplied by `sample_fn`
    /// (arguments: gate, pulse index).
    fn synthetic_beam(
        n_samples: usize,
        n_gates: usize,
        dual_pol: bool,
        sample_fn: impl Fn(usize, usize) -> Complex32,
    ) -> Beam {
        let pulses: Vec<Arc<Pulse>> = (0..n_samples)
            .map(|p| {
                let header = PulseHeader {
                    seq_num: p as u64,
                    time: 1000.0 + p as f64 * PRT,
                    prt: PRT,
                    az: 45.0,
                    el: 0.5,
                    n_gates,
                    n_channels: 1,
                    hv_flag: p % 2 == 0,
                };
                let iq = vec![(0..n_gates).map(|g| sample_fn(g, p)).collect()];
                Arc::new(Pulse::new(header, iq).unwrap())
            })
            .collect();
        let slice = BeamSlice {
            target_az: 45.0,
            el: 0.5,
            time: 1000.0,
            prt: PRT,
            indexed: true,
            pulses,
        };
        Beam::new(slice, dual_pol, false).unwrap()
    }

    fn tone_sample(vel: f64, amp: f32, pulse: usize) -> Complex32 {
        let phase = -4.0 * PI * vel * PRT * pulse as f64 / WAVELENGTH_M;
        Complex32::new(amp * phase.cos() as f32, amp * phase.sin() as f32)
    }

    #[test]
    fn single_pol_moments_recover_the_tone() {
        let radar = radar_config();
        let mut mgr = MomentsManager::new(&fft_mode(false), &radar).unwrap();
        let mut beam = synthetic_beam(64, 8, false, |_, p| tone_sample(10.0, 0.01, p));
        mgr.compute_moments(&mut beam).unwrap();

        for fields in beam.fields() {
            // amp 0.01 -> power -40 dBm, snr = 37 dB
            assert!((fields.snr - 37.0).abs() < 0.5, "snr = {}", fields.snr);
            assert!((fields.vel - 10.0).abs() < 1.0, "vel = {}", fields.vel);
            assert!(!is_missing(fields.dbz));
        }
        // dbz grows with range through the 20 log10(r) correction
        assert!(beam.fields()[7].dbz > beam.fields()[0].dbz);
    }

    #[test]
    fn censored_gate_keeps_power_but_no_dbz() {
        let radar = radar_config();
        let mut mgr = MomentsManager::new(&fft_mode(false), &radar).unwrap();
        let mut beam = synthetic_beam(64, 2, false, |_, p| tone_sample(10.0, 1.0e-6, p));
        mgr.compute_moments(&mut beam).unwrap();
        let fields = &beam.fields()[0];
        assert!(!is_missing(fields.dbm));
        assert!(is_missing(fields.dbz));
        assert!(is_missing(fields.vel));
    }

    #[test]
    fn dual_pol_recovers_zdr_and_phidp() {
        let radar = radar_config();
        let mut mgr = MomentsManager::new(&fft_mode(true), &radar).unwrap();
        let amp_h = 0.02f32;
        let amp_v = 0.01f32; // ZDR = +6 dB
        let psi = 30.0f64.to_radians();
        let vel = 8.0f64;
        let mut beam = synthetic_beam(64, 4, true, move |_, p| {
            let phase = -4.0 * PI * vel * PRT * p as f64 / WAVELENGTH_M;
            if p % 2 == 0 {
                Complex32::new(
                    amp_h * phase.cos() as f32,
                    amp_h * phase.sin() as f32,
                )
            } else {
                let ph = phase + psi;
                Complex32::new(amp_v * ph.cos() as f32, amp_v * ph.sin() as f32)
            }
        });
        mgr.compute_moments(&mut beam).unwrap();

        let fields = &beam.fields()[0];
        assert!((fields.zdr - 6.02).abs() < 0.3, "zdr = {}", fields.zdr);
        assert!((fields.phidp - 30.0).abs() < 2.0, "phidp = {}", fields.phidp);
        assert!((fields.vel - 8.0).abs() < 1.0, "vel = {}", fields.vel);
        assert!(fields.rhohv > 0.9, "rhohv = {}", fields.rhohv);
    }

    #[test]
    fn zdr_carries_the_calibration_offset() {
        let mut radar = radar_config();
        radar.zdr_correction_db = 0.4;
        let mut mgr = MomentsManager::new(&fft_mode(true), &radar).unwrap();
        let mut beam = synthetic_beam(64, 2, true, |_, p| {
            let amp = if p % 2 == 0 { 0.02 } else { 0.01 };
            tone_sample(8.0, amp, p)
        });
        mgr.compute_moments(&mut beam).unwrap();
        // 6.02 dB channel imbalance plus the 0.4 dB calibration term
        let fields = &beam.fields()[0];
        assert!((fields.zdr - 6.42).abs() < 0.3, "zdr = {}", fields.zdr);
    }

    #[test]
    fn unflagged_gates_copy_unfiltered_fields() {
        let radar = radar_config();
        let mut mgr = MomentsManager::new(&fft_mode(false), &radar).unwrap();
        let mut beam = synthetic_beam(64, 4, false, |_, p| tone_sample(10.0, 0.01, p));
        mgr.compute_moments(&mut beam).unwrap();
        mgr.filter_clutter(&mut beam).unwrap();
        for fields in beam.fields() {
            assert_eq!(fields.dbz_filtered, fields.dbz);
            assert_eq!(fields.vel_filtered, fields.vel);
            assert_eq!(fields.width_filtered, fields.width);
            assert!(is_missing(fields.clut));
        }
    }

    #[test]
    fn filtering_flagged_gate_recovers_weather_reflectivity() {
        let radar = radar_config();
        let mut mgr = MomentsManager::new(&fft_mode(false), &radar).unwrap();

        let weather_vel = 10.0;
        let weather_amp = 0.01f32;

        // weather-only reference
        let mut reference = synthetic_beam(64, 1, false, |_, p| {
            tone_sample(weather_vel, weather_amp, p)
        });
        mgr.compute_moments(&mut reference).unwrap();
        let ref_dbz = reference.fields()[0].dbz;
        let ref_vel = reference.fields()[0].vel;

        // same weather plus strong DC clutter, with a little amplitude
        // jitter so the clutter line has nonzero width
        let mut beam = synthetic_beam(64, 1, false, |_, p| {
            let jitter = 1.0 + 0.02 * ((p * 37 % 11) as f32 - 5.0) / 5.0;
            tone_sample(weather_vel, weather_amp, p) + Complex32::new(0.3 * jitter, 0.0)
        });
        mgr.compute_moments(&mut beam).unwrap();
        beam.fields_mut()[0].cmd_flag = true;
        mgr.filter_clutter(&mut beam).unwrap();

        let fields = &beam.fields()[0];
        assert!(!is_missing(fields.dbz_filtered));
        // the dB-for-dB correction deliberately charges back a few dB
        // when this much clutter is removed
        assert!(
            (fields.dbz_filtered - ref_dbz).abs() < 6.0,
            "dbzf = {} vs {}",
            fields.dbz_filtered,
            ref_dbz
        );
        assert!(
            (fields.vel_filtered - ref_vel).abs() < 2.0,
            "velf = {} vs {}",
            fields.vel_filtered,
            ref_vel
        );
        // clutter was ~30 dB above the weather
        assert!(fields.clut > 10.0, "clut = {}", fields.clut);
    }

    #[test]
    fn mean_velocity_unwraps_across_the_fold() {
        assert!((mean_velocity(10.0, 12.0, 12.5) - 11.0).abs() < 1e-6);
        // opposite sides of the fold at +-12.5
        let mean = mean_velocity(12.0, -12.0, 12.5);
        assert!((mean.abs() - 12.5).abs() < 0.6, "mean = {}", mean);
    }

    #[test]
    fn filtering_requires_cached_spectra() {
        let radar = radar_config();
        let mut mgr = MomentsManager::new(&fft_mode(false), &radar).unwrap();
        let mut beam = synthetic_beam(64, 2, false, |_, p| tone_sample(10.0, 0.01, p));
        assert!(mgr.filter_clutter(&mut beam).is_err());
        mgr.compute_moments(&mut beam).unwrap();
        assert!(beam.spectra().is_some());
        mgr.filter_clutter(&mut beam).unwrap();
        // the cache is consumed by the filter pass
        assert!(beam.spectra().is_none());
    }

    #[test]
    fn half_series_velocities_combine_on_the_doubled_interval() {
        // channels agreeing on |v| ~ 12 m/s from opposite sides of the
        // 12.5 m/s fold, expressed in doubled units on (-25, 25]
        let vel = 0.5 * mean_velocity(24.0, -24.0, 25.0);
        assert!((vel.abs() - 12.5).abs() < 0.6, "vel = {}", vel);
    }

    #[test]
    fn db_for_db_correction_only_above_threshold() {
        let radar = radar_config();
        let mgr = MomentsManager::new(&fft_mode(false), &radar).unwrap();
        let pwr = 1.0e-6f32;
        // removal of ~6 dB: below the 10 dB threshold, no correction
        assert_eq!(mgr.db_for_db(pwr, 3.0e-6), pwr);
        // removal of ~30 dB: proportional correction kicks in
        let corrected = mgr.db_for_db(pwr, 1.0e-3);
        assert!(corrected < pwr);
    }
}
