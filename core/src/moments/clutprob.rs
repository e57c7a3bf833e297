//! Narrowband clutter detection on a gate's power spectrum.
//!
//! Works on the unshifted magnitude spectrum (DC at bin 0) using signed
//! circular bin indices: bin 0 is zero Doppler and +/-N/2 the folding
//! velocity. Returned velocities follow the away-positive convention.

use crate::config::ClutterConfig;
use crate::prelude::MISSING;

/// Probe result for one gate. Velocity-valued members are MISSING when
/// `clutter_found` is false.
#[derive(Debug, Clone, Copy)]
pub struct ClutProb {
    pub clutter_found: bool,
    /// Signed bin index of the clutter peak, 0 = zero Doppler.
    pub clutter_peak_bin: i64,
    /// Signed bin index of a companion weather peak, if one was located.
    pub weather_peak_bin: Option<i64>,
    /// Separation between clutter and weather peaks, m/s.
    pub clut_wx_peak_sep: f32,
    /// DC-region to narrow-ring power ratio, dB.
    pub ratio_narrow: f32,
    /// DC-region to wide-ring power ratio, dB.
    pub ratio_wide: f32,
}

impl ClutProb {
    fn not_found() -> Self {
        Self {
            clutter_found: false,
            clutter_peak_bin: 0,
            weather_peak_bin: None,
            clut_wx_peak_sep: MISSING,
            ratio_narrow: MISSING,
            ratio_wide: MISSING,
        }
    }
}

pub struct ClutterProbe {
    config: ClutterConfig,
}

impl ClutterProbe {
    pub fn new(config: ClutterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClutterConfig {
        &self.config
    }

    /// Analyzes one magnitude spectrum. `nyquist` is the unambiguous
    /// velocity in m/s for the PRT the spectrum was sampled at.
    pub fn analyze(&self, mags: &[f32], nyquist: f64) -> ClutProb {
        let n = mags.len();
        if n < 16 {
            return ClutProb::not_found();
        }
        let power: Vec<f64> = mags.iter().map(|&m| (m as f64) * (m as f64)).collect();
        let vel_per_bin = 2.0 * nyquist / n as f64;

        // 8 equal blocks, each centered on a multiple of N/8; block 0
        // straddles zero Doppler.
        let half_block = n / 16;
        let block_mean = |center: i64| -> f64 {
            let mut sum = 0.0;
            let mut count = 0usize;
            for off in -(half_block as i64)..(half_block as i64) {
                sum += power[wrap_bin(center + off, n)];
                count += 1;
            }
            sum / count as f64
        };
        let dc_mean = block_mean(0);
        let max_other = (1..8)
            .map(|j| block_mean((j * n / 8) as i64))
            .fold(0.0f64, f64::max);

        if dc_mean * 2.0 < max_other {
            return ClutProb::not_found();
        }

        // clutter peak within the configured velocity window around DC
        let max_clut_bins = ((self.config.max_clutter_vel as f64 / vel_per_bin).round() as i64)
            .clamp(1, (n / 4) as i64);
        let clutter_peak_bin = argmax_signed(&power, -max_clut_bins, max_clut_bins);

        let weather_peak_bin = self.find_weather_peak(&power, clutter_peak_bin, vel_per_bin);

        let sep = weather_peak_bin
            .map(|wx| {
                let mut d = (wx - clutter_peak_bin).unsigned_abs() as f64;
                if d > (n / 2) as f64 {
                    d = n as f64 - d;
                }
                (d * vel_per_bin) as f32
            })
            .unwrap_or(MISSING);

        let (ratio_narrow, ratio_wide) = self.power_ratios(&power);

        ClutProb {
            clutter_found: true,
            clutter_peak_bin,
            weather_peak_bin,
            clut_wx_peak_sep: sep,
            ratio_narrow,
            ratio_wide,
        }
    }

    /// Weather-peak search. First tries the block diametrically opposite
    /// zero Doppler: if its peak stands at least 5x above the valleys on
    /// both flanks the spectrum is bimodal and that peak is taken.
    /// Otherwise the strongest bin outside twice the initial notch width
    /// is used, when one stands above its surroundings at all.
    fn find_weather_peak(&self, power: &[f64], clutter_peak: i64, vel_per_bin: f64) -> Option<i64> {
        let n = power.len();
        let far_center = (n / 2) as i64;
        let span = (n / 16) as i64;
        let far_peak = argmax_signed(power, far_center - span, far_center + span);
        let far_power = power[wrap_bin(far_peak, n)];

        let valley_ccw = valley_between(power, clutter_peak, far_peak, 1);
        let valley_cw = valley_between(power, far_peak, clutter_peak, 1);
        if far_power >= 5.0 * valley_ccw && far_power >= 5.0 * valley_cw {
            return Some(far_peak);
        }

        let notch_bins = ((self.config.init_notch_width as f64 / vel_per_bin).ceil() as i64).max(1);
        let exclusion = 2 * notch_bins;
        let mut best: Option<(i64, f64)> = None;
        for k in -((n / 2) as i64)..((n / 2) as i64) {
            if (k - clutter_peak).abs() <= exclusion {
                continue;
            }
            let p = power[wrap_bin(k, n)];
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((k, p));
            }
        }
        best.map(|(k, _)| k)
    }

    fn power_ratios(&self, power: &[f64]) -> (f32, f32) {
        let n = power.len();
        let inner = self.config.ratio_inner_bins as i64;
        let narrow = self.config.ratio_narrow_bins as i64;
        let wide = self.config.ratio_wide_bins as i64;

        let band_sum = |lo: i64, hi: i64| -> f64 {
            let mut sum = 0.0;
            for k in -((n / 2) as i64)..((n / 2) as i64) {
                let a = k.abs();
                if a >= lo && a <= hi {
                    sum += power[wrap_bin(k, n)];
                }
            }
            sum.max(f64::MIN_POSITIVE)
        };

        let inner_sum = band_sum(0, inner);
        let narrow_ring = band_sum(inner + 1, narrow.min((n / 2) as i64 - 1));
        let wide_ring = band_sum(inner + 1, wide.min((n / 2) as i64 - 1));

        let ratio_narrow = (10.0 * (inner_sum / narrow_ring).log10()) as f32;
        let ratio_wide = (10.0 * (inner_sum / wide_ring).log10()) as f32;
        (ratio_narrow, ratio_wide)
    }
}

pub(crate) fn wrap_bin(k: i64, n: usize) -> usize {
    k.rem_euclid(n as i64) as usize
}

fn argmax_signed(power: &[f64], lo: i64, hi: i64) -> i64 {
    let n = power.len();
    let mut best_k = lo;
    let mut best_p = f64::MIN;
    for k in lo..=hi {
        let p = power[wrap_bin(k, n)];
        if p > best_p {
            best_p = p;
            best_k = k;
        }
    }
    best_k
}

/// Minimum power walking circularly from `from` to `to` in `step`
/// direction (+1 or -1), endpoints excluded.
fn valley_between(power: &[f64], from: i64, to: i64, step: i64) -> f64 {
    let n = power.len();
    let mut k = from + step;
    let mut min_p = f64::MAX;
    let mut guard = 0;
    while wrap_bin(k, n) != wrap_bin(to, n) && guard < n {
        min_p = min_p.min(power[wrap_bin(k, n)]);
        k += step;
        guard += 1;
    }
    if min_p == f64::MAX {
        0.0
    } else {
        min_p
    }
}
