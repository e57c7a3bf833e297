//! Single-gate moment estimation: pulse-pair and spectral (FFT) paths.

use crate::config::WindowKind;
use crate::math::FftHelper;
use crate::moments::window::Taper;
use crate::prelude::{MomentsError, MomentsResult, MISSING, POWER_EPSILON};
use num_complex::Complex32;
use std::f64::consts::PI;

/// Moments for one gate. Power is always populated; velocity and width
/// are MISSING when the gate is censored or under-sampled.
#[derive(Debug, Clone, Copy)]
pub struct MomentSample {
    pub power: f32,
    pub vel: f32,
    pub width: f32,
    pub censored: bool,
}

/// Magnitude spectrum for one gate (DC at bin 0) plus the spectral noise
/// estimated from its quietest region. Feeds the clutter probe and filter.
#[derive(Debug, Clone)]
pub struct GateSpectrum {
    pub mags: Vec<f32>,
    pub measured_noise: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SpectralMoments {
    pub vel: f32,
    pub width: f32,
    pub measured_noise: f32,
}

pub struct SpectralEstimator {
    n_samples: usize,
    wavelength_m: f64,
    taper: Taper,
    fft: FftHelper,
    noise_dbm: f32,
    snr_threshold_db: f32,
}

impl SpectralEstimator {
    pub fn new(
        n_samples: usize,
        wavelength_m: f64,
        window: WindowKind,
        noise_dbm: f32,
        snr_threshold_db: f32,
    ) -> MomentsResult<Self> {
        if n_samples < 8 {
            return Err(MomentsError::Config(format!(
                "spectral estimation needs at least 8 samples, got {}",
                n_samples
            )));
        }
        if wavelength_m <= 0.0 {
            return Err(MomentsError::Config(format!(
                "wavelength must be positive, got {}",
                wavelength_m
            )));
        }
        Ok(Self {
            n_samples,
            wavelength_m,
            taper: Taper::new(window, n_samples),
            fft: FftHelper::new(n_samples),
            noise_dbm,
            snr_threshold_db,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Unambiguous velocity for the given pulse interval, m/s.
    pub fn nyquist(&self, prt: f64) -> f64 {
        self.wavelength_m / (4.0 * prt)
    }

    pub fn apply_window(&self, iq: &[Complex32]) -> Vec<Complex32> {
        self.taper.apply(iq)
    }

    /// True when total power falls under the fixed noise floor plus the
    /// SNR censoring threshold.
    pub fn censored(&self, power: f32) -> bool {
        let dbm = 10.0 * (power.max(POWER_EPSILON)).log10();
        dbm < self.noise_dbm + self.snr_threshold_db
    }

    pub fn mean_power(iq: &[Complex32]) -> f32 {
        if iq.is_empty() {
            return 0.0;
        }
        let sum: f64 = iq.iter().map(|s| s.norm_sqr() as f64).sum();
        (sum / iq.len() as f64) as f32
    }

    /// Mean of conj(a[i]) * b[i] over the paired length.
    pub fn mean_conj_product(a: &[Complex32], b: &[Complex32]) -> Complex32 {
        let n = a.len().min(b.len());
        if n == 0 {
            return Complex32::new(0.0, 0.0);
        }
        let mut re = 0.0f64;
        let mut im = 0.0f64;
        for i in 0..n {
            re += (a[i].re * b[i].re + a[i].im * b[i].im) as f64;
            im += (a[i].re * b[i].im - b[i].re * a[i].im) as f64;
        }
        Complex32::new((re / n as f64) as f32, (im / n as f64) as f32)
    }

    /// Time-domain pulse-pair estimator.
    pub fn compute_by_pulse_pair(&self, iq: &[Complex32], prt: f64) -> MomentSample {
        let power = Self::mean_power(iq);
        let mut sample = MomentSample {
            power,
            vel: MISSING,
            width: MISSING,
            censored: true,
        };
        if iq.len() < 3 {
            return sample;
        }
        if self.censored(power) {
            return sample;
        }
        sample.censored = false;

        let nyquist = self.nyquist(prt);
        let nyq_fac = nyquist / PI;

        // lag-1 autocovariance
        let mut a = 0.0f64;
        let mut b = 0.0f64;
        for pair in iq.windows(2) {
            a += (pair[0].re * pair[1].re + pair[0].im * pair[1].im) as f64;
            b += (pair[0].re * pair[1].im - pair[1].re * pair[0].im) as f64;
        }
        let r1 = (a * a + b * b).sqrt() / iq.len() as f64;
        sample.vel = (-nyq_fac * b.atan2(a)) as f32;

        // lag-2 autocovariance
        let mut a2 = 0.0f64;
        let mut b2 = 0.0f64;
        for i in 0..iq.len() - 2 {
            a2 += (iq[i].re * iq[i + 2].re + iq[i].im * iq[i + 2].im) as f64;
            b2 += (iq[i].re * iq[i + 2].im - iq[i + 2].re * iq[i].im) as f64;
        }
        let r2 = (a2 * a2 + b2 * b2).sqrt() / iq.len() as f64;

        if r1 > 0.0 && r2 > 0.0 {
            let r1r2_fac = (2.0 * nyquist) / (PI * 6.0f64.sqrt());
            let ln_r1r2 = (r1 / r2).ln();
            sample.width = if ln_r1r2 > 0.0 {
                (r1r2_fac * ln_r1r2.sqrt()) as f32
            } else {
                (-r1r2_fac * (-ln_r1r2).sqrt()) as f32
            };
        }
        sample
    }

    /// Spectral estimator: forward FFT, then first and second moments of
    /// the noise-corrected, peak-centered power spectrum.
    pub fn compute_by_fft(&self, iq_windowed: &[Complex32], prt: f64) -> (MomentSample, GateSpectrum) {
        let mags = self.fft.magnitudes(iq_windowed);
        let power = mags.iter().map(|&m| (m as f64) * (m as f64)).sum::<f64>() as f32
            / self.n_samples as f32;

        let spectral = self.vel_width_from_mags(&mags, prt);
        let mut sample = MomentSample {
            power,
            vel: MISSING,
            width: MISSING,
            censored: true,
        };
        if !self.censored(power) {
            sample.censored = false;
            sample.vel = spectral.vel;
            sample.width = spectral.width;
        }
        let spectrum = GateSpectrum {
            mags,
            measured_noise: spectral.measured_noise,
        };
        (sample, spectrum)
    }

    /// Velocity and width from a magnitude spectrum with DC at bin 0.
    pub fn vel_width_from_mags(&self, mags: &[f32], prt: f64) -> SpectralMoments {
        let n = mags.len();
        let k_cent = (n / 2) as i64;

        // locate the spectral peak and center the power array on it
        let mut k_max = 0i64;
        let mut max_power = 0.0f64;
        for (k, &m) in mags.iter().enumerate() {
            let p = (m as f64) * (m as f64);
            if p > max_power {
                max_power = p;
                k_max = k as i64;
            }
        }
        if k_max >= k_cent {
            k_max -= n as i64;
        }
        let k_offset = k_cent - k_max;
        let mut power_centered = vec![0.0f64; n];
        for (k, &m) in mags.iter().enumerate() {
            let kk = ((k as i64 + k_offset).rem_euclid(n as i64)) as usize;
            power_centered[kk] = (m as f64) * (m as f64);
        }

        let (noise_mean, noise_sdev) = spectral_noise(&power_centered);
        let noise_threshold = noise_mean + noise_sdev;

        // trim the integration limits: walk out from the center until 3
        // consecutive bins fall below the noise threshold
        let k_start = trim_down(&power_centered, k_cent as usize, noise_threshold);
        let k_end = trim_up(&power_centered, k_cent as usize, noise_threshold);

        let mut sum_power = 0.0f64;
        let mut sum_k = 0.0f64;
        let mut sum_k2 = 0.0f64;
        for kk in k_start..=k_end {
            let excess = (power_centered[kk] - noise_mean).max(0.0);
            let k = kk as f64;
            sum_power += excess;
            sum_k += k * excess;
            sum_k2 += k * k * excess;
        }

        let mut out = SpectralMoments {
            vel: MISSING,
            width: MISSING,
            measured_noise: noise_mean as f32,
        };
        if sum_power <= 0.0 {
            return out;
        }
        let mean_k = sum_k / sum_power;
        let var_k = (sum_k2 / sum_power - mean_k * mean_k).max(0.0);
        let vel_fac = self.wavelength_m / (2.0 * n as f64 * prt);
        out.vel = -(vel_fac * (mean_k - k_offset as f64)) as f32;
        out.width = (vel_fac * var_k.sqrt()) as f32;
        out
    }
}

/// Spectral noise from the quietest of three regions of the peak-centered
/// spectrum: the two outer eighths combined, the lower quarter, and the
/// upper quarter. Returns (mean, sdev) of the chosen region.
fn spectral_noise(power_centered: &[f64]) -> (f64, f64) {
    let n = power_centered.len();
    let n8 = (n / 8).max(1);
    let n4 = (n / 4).max(1);

    let ends: Vec<f64> = power_centered[..n8]
        .iter()
        .chain(power_centered[n - n8..].iter())
        .copied()
        .collect();
    let lower = &power_centered[..n4];
    let upper = &power_centered[n - n4..];

    let candidates = [
        mean_sdev(&ends),
        mean_sdev(lower),
        mean_sdev(upper),
    ];
    candidates
        .iter()
        .copied()
        .fold(candidates[0], |best, c| if c.0 < best.0 { c } else { best })
}

fn mean_sdev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = (values.iter().map(|v| v * v).sum::<f64>() / n - mean * mean).max(0.0);
    (mean, var.sqrt())
}

fn trim_down(power: &[f64], k_cent: usize, threshold: f64) -> usize {
    let mut below = 0;
    let mut k_start = k_cent;
    for kk in (0..k_cent).rev() {
        if power[kk] < threshold {
            below += 1;
            if below >= 3 {
                break;
            }
        } else {
            below = 0;
            k_start = kk;
        }
    }
    k_start
}

fn trim_up(power: &[f64], k_cent: usize, threshold: f64) -> usize {
    let mut below = 0;
    let mut k_end = k_cent;
    for kk in k_cent + 1..power.len() {
        if power[kk] < threshold {
            below += 1;
            if below >= 3 {
                break;
            }
        } else {
            below = 0;
            k_end = kk;
        }
    }
    k_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::is_missing;

    const WAVELENGTH: f64 = 0.10;
    const PRT: f64 = 0.001;

    fn estimator(window: WindowKind) -> SpectralEstimator {
        SpectralEstimator::new(64, WAVELENGTH, window, -77.0, 3.0).unwrap()
    }

    /// Tone whose phase advances so the pipeline reports velocity `vel`
    /// (positive away from the radar).
    fn tone(n: usize, vel: f64, amp: f32) -> Vec<Complex32> {
        (0..n)
            .map(|i| {
                let phase = -4.0 * PI * vel * PRT * i as f64 / WAVELENGTH;
                Complex32::new(
                    amp * phase.cos() as f32,
                    amp * phase.sin() as f32,
                )
            })
            .collect()
    }

    #[test]
    fn pulse_pair_recovers_tone_velocity() {
        let est = estimator(WindowKind::Rect);
        let iq = tone(64, 10.0, 1.0);
        let m = est.compute_by_pulse_pair(&iq, PRT);
        assert!(!m.censored);
        assert!((m.vel - 10.0).abs() < 0.1, "vel = {}", m.vel);
        assert!((m.power - 1.0).abs() < 1e-3);
    }

    #[test]
    fn fft_recovers_tone_velocity() {
        let est = estimator(WindowKind::Hanning);
        let iq = est.apply_window(&tone(64, 10.0, 1.0));
        let (m, _) = est.compute_by_fft(&iq, PRT);
        assert!(!m.censored);
        // FFT bin spacing is wavelength/(2 N prt) ~ 0.78 m/s
        assert!((m.vel - 10.0).abs() < 1.0, "vel = {}", m.vel);
    }

    #[test]
    fn pulse_pair_and_fft_agree_on_sign() {
        let est = estimator(WindowKind::Rect);
        for vel in [-18.0, -5.0, 5.0, 18.0] {
            let iq = tone(64, vel, 1.0);
            let pp = est.compute_by_pulse_pair(&iq, PRT);
            let (ff, _) = est.compute_by_fft(&iq, PRT);
            assert_eq!(pp.vel.signum(), ff.vel.signum(), "vel = {}", vel);
            assert!((pp.vel - ff.vel).abs() < 1.0, "{} vs {}", pp.vel, ff.vel);
        }
    }

    #[test]
    fn weak_gate_is_censored() {
        let est = estimator(WindowKind::Rect);
        // -77 dBm floor + 3 dB threshold: amplitude for -80 dBm is 1e-4
        let iq = tone(64, 10.0, 1.0e-5);
        let m = est.compute_by_pulse_pair(&iq, PRT);
        assert!(m.censored);
        assert!(is_missing(m.vel));
        assert!(is_missing(m.width));
        assert!(m.power > 0.0);
    }

    #[test]
    fn snr_floor_boundary_is_exact() {
        let est = estimator(WindowKind::Rect);
        // threshold sits at -74 dBm; power is in linear mW here
        let just_below = 10.0f32.powf(-74.01 / 10.0);
        let just_above = 10.0f32.powf(-73.99 / 10.0);
        assert!(est.censored(just_below));
        assert!(!est.censored(just_above));
    }

    #[test]
    fn too_few_samples_produce_no_velocity() {
        let est = estimator(WindowKind::Rect);
        let iq = tone(2, 10.0, 1.0);
        let m = est.compute_by_pulse_pair(&iq, PRT);
        assert!(is_missing(m.vel));
        assert!(is_missing(m.width));
    }

    #[test]
    fn spectrum_above_tone_is_nearly_noiseless() {
        let est = estimator(WindowKind::Hanning);
        let iq = est.apply_window(&tone(64, 5.0, 1.0));
        let (_, spectrum) = est.compute_by_fft(&iq, PRT);
        assert_eq!(spectrum.mags.len(), 64);
        assert!(spectrum.measured_noise < 1e-3);
    }
}
