//! Fuzzy-logic clutter classification over a beam window.
//!
//! Texture and spin are aggregated over a range kernel and the
//! contiguous beams around the center; the spatial standard deviations
//! come from the center beam alone; fusion evaluates each interest map
//! only when its input is present.

use crate::beam::Beam;
use crate::cmd::interest::{CmdInterestMaps, InterestSum};
use crate::cmd::speckle::{fill_flag_gaps, run_speckle_filter};
use crate::config::CmdConfig;
use crate::math::{az_diff, StatsHelper};
use crate::prelude::{is_missing, MomentsResult, MISSING};
use log::trace;
use ndarray::{s, Array2, ArrayView2};

pub struct CmdClassifier {
    config: CmdConfig,
    maps: CmdInterestMaps,
    az_resolution_deg: f32,
    kernel_half: usize,
}

/// Spin-change cell states in the (beam, gate) arrays.
const SPIN_NONE: i8 = -1;
const SPIN_STEADY: i8 = 0;
const SPIN_CHANGE: i8 = 1;

impl CmdClassifier {
    pub fn new(
        config: &CmdConfig,
        az_resolution_deg: f32,
        gate_spacing_km: f32,
    ) -> MomentsResult<Self> {
        let maps = CmdInterestMaps::from_config(config)?;
        let mut kernel = (config.kernel_range_km / gate_spacing_km.max(1.0e-3)).round() as usize;
        if kernel % 2 == 0 {
            kernel += 1;
        }
        Ok(Self {
            config: config.clone(),
            maps,
            az_resolution_deg,
            kernel_half: kernel.max(1) / 2,
        })
    }

    pub fn kernel_gates(&self) -> usize {
        2 * self.kernel_half + 1
    }

    /// Classifies the gates of `beams[center]`, using the neighboring
    /// beams as azimuthal context.
    pub fn classify(&self, beams: &mut [Beam], center: usize) -> MomentsResult<()> {
        let (lo, hi) = self.beam_limits(beams, center);
        let n_gates = beams[center].n_gates();

        // adjacent-gate difference arrays, one row per kernel beam
        let n_beams = hi - lo + 1;
        let mut diff_sq = Array2::<f32>::from_elem((n_beams, n_gates), MISSING);
        let mut spin_chg = Array2::<i8>::from_elem((n_beams, n_gates), SPIN_NONE);
        for (row, b) in (lo..=hi).enumerate() {
            let (d, c) = beam_diffs(&beams[b], &self.config);
            for gate in 0..n_gates {
                diff_sq[[row, gate]] = d[gate];
                spin_chg[[row, gate]] = c[gate];
            }
        }

        let tdbz = self.kernel_texture(diff_sq.view(), n_gates);
        let spin = self.kernel_spin(spin_chg.view(), n_gates);
        let vel_sdev = self.center_sdev(&beams[center], n_gates, |f| f.vel);
        let zdr_sdev = self.center_sdev(&beams[center], n_gates, |f| f.zdr);
        let rhohv_sdev = self.center_sdev(&beams[center], n_gates, |f| f.rhohv);
        let phidp_sdev = self.center_sdev(&beams[center], n_gates, |f| f.phidp);

        trace!(
            "cmd kernel: beams {}..={} of {}, {} range gates",
            lo,
            hi,
            beams.len(),
            self.kernel_gates()
        );

        let fields = beams[center].fields_mut();
        for gate in 0..n_gates {
            let f = &mut fields[gate];
            f.tdbz = tdbz[gate];
            f.sqrt_tdbz = if is_missing(tdbz[gate]) {
                MISSING
            } else {
                tdbz[gate].sqrt()
            };
            f.spin = spin[gate];
            f.vel_sdev = vel_sdev[gate];
            f.zdr_sdev = zdr_sdev[gate];
            f.rhohv_sdev = rhohv_sdev[gate];
            f.phidp_sdev = phidp_sdev[gate];

            // gates at or below the SNR floor never enter fusion
            if is_missing(f.dbz) || is_missing(f.snr) || f.snr <= self.config.snr_threshold_db {
                f.cmd = MISSING;
                f.cmd_flag = false;
                continue;
            }

            let mut sum = InterestSum::new();
            sum.add(&self.maps.tdbz, f.tdbz);
            sum.add(&self.maps.spin, f.spin);
            accumulate_max(
                &mut sum,
                self.maps.tdbz.interest(f.tdbz),
                self.maps.spin.interest(f.spin),
                self.config.max_tdbz_spin_weight,
            );
            sum.add(&self.maps.width, f.width);
            sum.add(&self.maps.wx_peak_sep, f.clut_wx_peak_sep);
            accumulate_max(
                &mut sum,
                self.maps.width.interest(f.width),
                self.maps.wx_peak_sep.interest(f.clut_wx_peak_sep),
                self.config.max_width_sep_weight,
            );
            sum.add(&self.maps.vel_sdev, f.vel_sdev);
            sum.add(&self.maps.zdr_sdev, f.zdr_sdev);
            sum.add(&self.maps.rhohv_sdev, f.rhohv_sdev);
            sum.add(&self.maps.phidp_sdev, f.phidp_sdev);
            sum.add(&self.maps.ratio_narrow, f.ratio_narrow);
            sum.add(&self.maps.ratio_wide, f.ratio_wide);

            match sum.result() {
                Some(cmd) => {
                    f.cmd = cmd;
                    // the fuzzy score needs narrowband corroboration
                    f.cmd_flag = cmd >= self.config.threshold_for_clutter
                        && !is_missing(f.ratio_narrow)
                        && f.ratio_narrow >= self.config.min_ratio_narrow;
                }
                None => {
                    f.cmd = MISSING;
                    f.cmd_flag = false;
                }
            }
        }

        if self.config.apply_speckle_filter {
            let mut flags: Vec<bool> = fields.iter().map(|f| f.cmd_flag).collect();
            let cmd: Vec<f32> = fields.iter().map(|f| f.cmd).collect();
            run_speckle_filter(&mut flags, &cmd, &self.config.speckle_thresholds);
            fill_flag_gaps(&mut flags, self.config.speckle_max_gap);
            for (f, flag) in fields.iter_mut().zip(flags) {
                f.cmd_flag = flag;
            }
        }
        Ok(())
    }

    /// Contiguous beam sub-range around the center sharing geometry, so
    /// the kernel never crosses a scan discontinuity.
    fn beam_limits(&self, beams: &[Beam], center: usize) -> (usize, usize) {
        let compatible = |a: &Beam, b: &Beam| {
            a.n_gates() == b.n_gates()
                && a.n_samples() == b.n_samples()
                && az_diff(a.az(), b.az()).abs() <= 2.0 * self.az_resolution_deg
                && (a.el() - beams[center].el()).abs() <= self.config.max_elev_diff
        };
        let mut lo = center;
        while lo > 0 && compatible(&beams[lo - 1], &beams[lo]) {
            lo -= 1;
        }
        let mut hi = center;
        while hi + 1 < beams.len() && compatible(&beams[hi + 1], &beams[hi]) {
            hi += 1;
        }
        (lo, hi)
    }

    /// Mean squared reflectivity step over the kernel (beams x range).
    fn kernel_texture(&self, diff_sq: ArrayView2<f32>, n_gates: usize) -> Vec<f32> {
        (0..n_gates)
            .map(|gate| {
                let span = kernel_span(gate, self.kernel_half, n_gates);
                let block = diff_sq.slice(s![.., span]);
                let mut sum = 0.0f64;
                let mut count = 0usize;
                for &v in block.iter() {
                    if !is_missing(v) {
                        sum += v as f64;
                        count += 1;
                    }
                }
                if count == 0 {
                    MISSING
                } else {
                    (sum / count as f64) as f32
                }
            })
            .collect()
    }

    /// Percentage of reflectivity steps flipping the spin sense.
    fn kernel_spin(&self, spin_chg: ArrayView2<i8>, n_gates: usize) -> Vec<f32> {
        (0..n_gates)
            .map(|gate| {
                let span = kernel_span(gate, self.kernel_half, n_gates);
                let block = spin_chg.slice(s![.., span]);
                let total = block.iter().filter(|&&c| c != SPIN_NONE).count();
                if total == 0 {
                    return MISSING;
                }
                let changes = block.iter().filter(|&&c| c == SPIN_CHANGE).count();
                100.0 * changes as f32 / total as f32
            })
            .collect()
    }

    fn center_sdev(
        &self,
        beam: &Beam,
        n_gates: usize,
        get: fn(&crate::fields::Fields) -> f32,
    ) -> Vec<f32> {
        let values: Vec<f32> = beam.fields().iter().map(get).collect();
        (0..n_gates)
            .map(|gate| {
                let span = kernel_span(gate, self.kernel_half, n_gates);
                StatsHelper::sdev(&values[span]).unwrap_or(MISSING)
            })
            .collect()
    }
}

fn kernel_span(gate: usize, half: usize, n_gates: usize) -> std::ops::Range<usize> {
    let lo = gate.saturating_sub(half);
    let hi = (gate + half + 1).min(n_gates);
    lo..hi
}

fn accumulate_max(sum: &mut InterestSum, a: Option<f32>, b: Option<f32>, weight: f32) {
    let composite = match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    };
    if let Some(interest) = composite {
        sum.accumulate(interest, weight);
    }
}

/// Adjacent-gate reflectivity differences for one beam. Gate 0 copies
/// gate 1 so the arrays stay gate-aligned.
fn beam_diffs(beam: &Beam, config: &CmdConfig) -> (Vec<f32>, Vec<i8>) {
    let n = beam.n_gates();
    let mut dbz_diff_sq = vec![MISSING; n];
    let mut spin_change = vec![SPIN_NONE; n];
    let mut sense = 0i32;
    for gate in 1..n {
        let prev = beam.fields()[gate - 1].dbz;
        let this = beam.fields()[gate].dbz;
        if is_missing(prev) || is_missing(this) {
            continue;
        }
        let diff = this - prev;
        dbz_diff_sq[gate] = diff * diff;
        let mut change = SPIN_STEADY;
        if diff >= config.spin_dbz_threshold && sense != 1 {
            change = SPIN_CHANGE;
            sense = 1;
        } else if diff <= -config.spin_dbz_threshold && sense != -1 {
            change = SPIN_CHANGE;
            sense = -1;
        }
        spin_change[gate] = change;
    }
    if n > 1 {
        dbz_diff_sq[0] = dbz_diff_sq[1];
        spin_change[0] = spin_change[1];
    }
    (dbz_diff_sq, spin_change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::{BeamSlice, Pulse, PulseHeader};
    use num_complex::Complex32;
    use std::sync::Arc;

    const N_GATES: usize = 24;

    fn empty_beam(az: f32, el: f32) -> Beam {
        let pulses = (0..8)
            .map(|p| {
                let header = PulseHeader {
                    seq_num: p,
                    time: 1000.0,
                    prt: 0.001,
                    az,
                    el,
                    n_gates: N_GATES,
                    n_channels: 1,
                    hv_flag: true,
                };
                Arc::new(
                    Pulse::new(header, vec![vec![Complex32::new(0.1, 0.0); N_GATES]]).unwrap(),
                )
            })
            .collect();
        Beam::new(
            BeamSlice {
                target_az: az,
                el,
                time: 1000.0,
                prt: 0.001,
                indexed: true,
                pulses,
            },
            false,
            false,
        )
        .unwrap()
    }

    /// Smooth weather ray: gentle reflectivity gradient, steady velocity.
    fn weather_beam(az: f32) -> Beam {
        let mut beam = empty_beam(az, 0.5);
        for (g, f) in beam.fields_mut().iter_mut().enumerate() {
            f.snr = 25.0;
            f.dbz = 30.0 + 0.2 * g as f32;
            f.vel = 10.0;
            f.width = 2.0;
            f.zdr = 0.5;
            f.rhohv = 0.99;
            f.phidp = 25.0 + 0.1 * g as f32;
        }
        beam
    }

    /// Clutter-contaminated ray: jumpy reflectivity, narrow width, high
    /// narrowband power ratio.
    fn clutter_beam(az: f32) -> Beam {
        let mut beam = empty_beam(az, 0.5);
        for (g, f) in beam.fields_mut().iter_mut().enumerate() {
            f.snr = 30.0;
            f.dbz = 40.0 + if g % 2 == 0 { 8.0 } else { -8.0 };
            f.vel = 0.1 * if g % 3 == 0 { 1.0 } else { -1.0 };
            f.width = 0.2;
            f.zdr = if g % 2 == 0 { 3.0 } else { -2.0 };
            f.rhohv = 0.85 + 0.1 * (g % 2) as f32;
            f.phidp = if g % 2 == 0 { 40.0 } else { -10.0 };
            f.ratio_narrow = 15.0;
            f.ratio_wide = 12.0;
        }
        beam
    }

    fn classifier() -> CmdClassifier {
        CmdClassifier::new(&CmdConfig::default(), 1.0, 0.25).unwrap()
    }

    #[test]
    fn kernel_length_is_odd() {
        let c = classifier();
        // 1.5 km at 0.25 km spacing -> 7 gates
        assert_eq!(c.kernel_gates(), 7);
    }

    #[test]
    fn weather_beams_are_not_flagged() {
        let mut beams: Vec<Beam> = (0..5).map(|i| weather_beam(10.0 + i as f32)).collect();
        classifier().classify(&mut beams, 2).unwrap();
        for f in beams[2].fields() {
            assert!(!f.cmd_flag, "cmd = {}", f.cmd);
        }
    }

    #[test]
    fn clutter_beams_are_flagged() {
        let mut beams: Vec<Beam> = (0..5).map(|i| clutter_beam(10.0 + i as f32)).collect();
        classifier().classify(&mut beams, 2).unwrap();
        let flagged = beams[2].fields().iter().filter(|f| f.cmd_flag).count();
        assert!(flagged > N_GATES / 2, "{} gates flagged", flagged);
        let f = &beams[2].fields()[N_GATES / 2];
        assert!(f.cmd > 0.5, "cmd = {}", f.cmd);
        assert!(!is_missing(f.tdbz));
        assert!(f.spin > 0.0);
    }

    #[test]
    fn gate_at_snr_floor_is_excluded() {
        let mut beams: Vec<Beam> = (0..5).map(|i| clutter_beam(10.0 + i as f32)).collect();
        // default floor is 3 dB
        beams[2].fields_mut()[5].snr = 3.0;
        beams[2].fields_mut()[6].snr = 3.01;
        classifier().classify(&mut beams, 2).unwrap();
        assert!(is_missing(beams[2].fields()[5].cmd));
        assert!(!is_missing(beams[2].fields()[6].cmd));
    }

    #[test]
    fn phidp_texture_raises_the_fused_score() {
        let mut smooth: Vec<Beam> = (0..5).map(|i| weather_beam(10.0 + i as f32)).collect();
        let mut noisy: Vec<Beam> = (0..5).map(|i| weather_beam(10.0 + i as f32)).collect();
        for beam in noisy.iter_mut() {
            for (g, f) in beam.fields_mut().iter_mut().enumerate() {
                f.phidp = if g % 2 == 0 { 40.0 } else { 0.0 };
            }
        }
        classifier().classify(&mut smooth, 2).unwrap();
        classifier().classify(&mut noisy, 2).unwrap();
        let gate = N_GATES / 2;
        let f = &noisy[2].fields()[gate];
        assert!(f.phidp_sdev > 10.0, "phidp_sdev = {}", f.phidp_sdev);
        assert!(
            f.cmd > smooth[2].fields()[gate].cmd,
            "noisy cmd = {}, smooth cmd = {}",
            f.cmd,
            smooth[2].fields()[gate].cmd
        );
    }

    #[test]
    fn high_score_without_narrow_ratio_does_not_flag() {
        let mut beams: Vec<Beam> = (0..5).map(|i| clutter_beam(10.0 + i as f32)).collect();
        for beam in beams.iter_mut() {
            for f in beam.fields_mut() {
                f.ratio_narrow = MISSING;
                f.ratio_wide = MISSING;
            }
        }
        classifier().classify(&mut beams, 2).unwrap();
        for f in beams[2].fields() {
            assert!(!f.cmd_flag);
        }
    }

    #[test]
    fn elevation_step_limits_the_kernel() {
        let mut beams: Vec<Beam> = (0..5).map(|i| clutter_beam(10.0 + i as f32)).collect();
        // neighbors at a different elevation are excluded, but the center
        // beam still classifies on its own
        beams[0] = clutter_beam(10.0);
        beams[1] = clutter_beam(11.0);
        let mut far = empty_beam(13.0, 5.0);
        for f in far.fields_mut() {
            f.snr = 30.0;
            f.dbz = 10.0;
        }
        beams[3] = far;
        classifier().classify(&mut beams, 2).unwrap();
        let flagged = beams[2].fields().iter().filter(|f| f.cmd_flag).count();
        assert!(flagged > 0);
    }
}
