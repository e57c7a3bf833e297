//! Adaptive notch filter: removes the clutter peak from a power spectrum
//! and rebuilds the notched region from a Gaussian fitted to the
//! remaining weather signal.

use crate::config::ClutterConfig;
use crate::moments::clutprob::{wrap_bin, ClutProb};

/// Outcome of filtering one gate's spectrum.
#[derive(Debug, Clone)]
pub struct ClutFilterResult {
    /// Filtered magnitude spectrum, DC at bin 0.
    pub mags: Vec<f32>,
    /// Mean power removed per sample.
    pub power_removed: f32,
    /// Velocity of the fitted weather Gaussian, m/s, away-positive.
    pub vel: f32,
    /// Spectrum width of the fitted Gaussian, m/s.
    pub width: f32,
}

pub struct ClutFilter {
    config: ClutterConfig,
}

impl ClutFilter {
    pub fn new(config: ClutterConfig) -> Self {
        Self { config }
    }

    /// Notches the clutter peak and fits the residual weather spectrum.
    /// `noise` is the per-bin spectral noise estimate used as the floor
    /// of the notch.
    pub fn filter(
        &self,
        mags: &[f32],
        probe: &ClutProb,
        noise: f32,
        nyquist: f64,
    ) -> ClutFilterResult {
        let n = mags.len();
        let raw: Vec<f64> = mags.iter().map(|&m| (m as f64) * (m as f64)).collect();
        let noise = (noise as f64).max(f64::MIN_POSITIVE);
        let vel_per_bin = 2.0 * nyquist / n as f64;

        let clut_peak = probe.clutter_peak_bin;
        let notch_bins = ((self.config.init_notch_width as f64 / vel_per_bin).ceil() as i64).max(1);

        let mut filtered = raw.clone();
        for off in -notch_bins..=notch_bins {
            filtered[wrap_bin(clut_peak + off, n)] = noise;
        }

        // widen by one bin on each side, copying the next-outer value
        let mut notch_lo = clut_peak - notch_bins - 1;
        let mut notch_hi = clut_peak + notch_bins + 1;
        filtered[wrap_bin(notch_lo, n)] = raw[wrap_bin(notch_lo - 1, n)];
        filtered[wrap_bin(notch_hi, n)] = raw[wrap_bin(notch_hi + 1, n)];

        // the fit is centered on the weather peak when one was found,
        // otherwise on the residual spectrum itself
        let wx_center = probe.weather_peak_bin.unwrap_or(clut_peak);
        let max_expand = (n / 4) as i64;

        let mut mean_offset = 0.0f64;
        let mut sigma = 1.0f64;

        for _pass in 0..self.config.gaussian_fit_passes {
            let Some((mu, sd, gauss_amp)) =
                fit_gaussian(&filtered, wx_center, notch_lo, notch_hi, clut_peak, noise)
            else {
                break;
            };
            mean_offset = mu;
            sigma = sd;

            let gauss = |k: i64| -> f64 {
                let d = signed_offset(k - wx_center, n) as f64;
                let z = (d - mu) / sd;
                (gauss_amp * (-0.5 * z * z).exp()).max(noise)
            };

            // expand the notch outward while the raw spectrum exceeds
            // the fit, or tracks within a multiple of it and keeps
            // decreasing outward
            let ratio = self.config.notch_follow_ratio as f64;
            while notch_hi - clut_peak < max_expand {
                let next = notch_hi + 1;
                let raw_next = raw[wrap_bin(next, n)];
                let fit_next = gauss(next);
                let decreasing = raw_next < raw[wrap_bin(notch_hi, n)];
                if raw_next > fit_next || (raw_next <= ratio * fit_next && decreasing) {
                    notch_hi = next;
                } else {
                    break;
                }
            }
            while clut_peak - notch_lo < max_expand {
                let next = notch_lo - 1;
                let raw_next = raw[wrap_bin(next, n)];
                let fit_next = gauss(next);
                let decreasing = raw_next < raw[wrap_bin(notch_lo, n)];
                if raw_next > fit_next || (raw_next <= ratio * fit_next && decreasing) {
                    notch_lo = next;
                } else {
                    break;
                }
            }

            for k in notch_lo..=notch_hi {
                filtered[wrap_bin(k, n)] = gauss(k);
            }
        }

        let removed: f64 = raw
            .iter()
            .zip(filtered.iter())
            .map(|(&r, &f)| (r - f).max(0.0))
            .sum();

        let center = signed_offset(wx_center, n) as f64 + mean_offset;
        ClutFilterResult {
            mags: filtered.iter().map(|&p| (p.sqrt()) as f32).collect(),
            power_removed: (removed / n as f64) as f32,
            vel: (-(center * vel_per_bin)) as f32,
            width: (sigma * vel_per_bin) as f32,
        }
    }
}

/// Moment fit of a Gaussian to the noise-corrected spectrum outside the
/// notch, with offsets taken relative to `wx_center`. Returns
/// (mean offset, sigma, peak amplitude), or None if no power remains.
fn fit_gaussian(
    filtered: &[f64],
    wx_center: i64,
    notch_lo: i64,
    notch_hi: i64,
    clut_peak: i64,
    noise: f64,
) -> Option<(f64, f64, f64)> {
    let n = filtered.len();
    let mut sum_p = 0.0f64;
    let mut sum_d = 0.0f64;
    let mut sum_d2 = 0.0f64;
    for k in 0..n as i64 {
        // classify against the notch in clutter-relative coordinates
        let rel = signed_offset(k - clut_peak, n);
        if rel + clut_peak >= notch_lo && rel + clut_peak <= notch_hi {
            continue;
        }
        let excess = filtered[k as usize] - noise;
        if excess <= 0.0 {
            continue;
        }
        let d = signed_offset(k - wx_center, n) as f64;
        sum_p += excess;
        sum_d += d * excess;
        sum_d2 += d * d * excess;
    }
    if sum_p <= 0.0 {
        return None;
    }
    let mu = sum_d / sum_p;
    let var = (sum_d2 / sum_p - mu * mu).max(0.25);
    let sigma = var.sqrt();
    let amp = sum_p / ((2.0 * std::f64::consts::PI).sqrt() * sigma);
    Some((mu, sigma, amp))
}

/// Maps a circular bin difference into [-n/2, n/2).
fn signed_offset(diff: i64, n: usize) -> i64 {
    let n = n as i64;
    let mut d = diff.rem_euclid(n);
    if d >= n / 2 {
        d -= n;
    }
    d
}
