//! Bounded, time-ordered pulse buffer and the beam-readiness test.

use crate::math::angles::{az_diff, condition_az};
use crate::prelude::{MomentsError, MomentsResult};
use crate::pulse::Pulse;
use std::collections::VecDeque;
use std::sync::Arc;

/// PRT mismatch tolerance across a sample window, seconds.
const PRT_TOLERANCE: f64 = 1.0e-3;

/// Azimuth change below which a pulse counts toward an antenna stall, deg.
const STALL_DELTA_DEG: f32 = 0.01;

/// The N pulses selected for one beam, oldest first, plus the pointing
/// derived from the temporal midpoint of the window.
#[derive(Debug)]
pub struct BeamSlice {
    pub pulses: Vec<Arc<Pulse>>,
    pub target_az: f32,
    pub el: f32,
    pub time: f64,
    pub prt: f64,
    /// False when readiness came from the non-indexed or stalled path.
    pub indexed: bool,
}

/// Sliding buffer of recent pulses, newest at the front.
///
/// Capacity is 2x the sample count plus two, so a beam's pulses stay
/// resident while the next beam accumulates. Eviction drops the window's
/// reference; a pulse is actually freed once no beam shares it.
pub struct PulseWindow {
    pulses: VecDeque<Arc<Pulse>>,
    capacity: usize,
    n_samples: usize,
    index_beams: bool,
    /// Resolution rounded so a whole number of beams fits in 45 degrees.
    angular_res: f32,
    prev_az_index: Option<i64>,
    pulses_since_beam: usize,
    stall_count: usize,
    last_az: Option<f32>,
}

impl PulseWindow {
    pub fn new(n_samples: usize, index_beams: bool, az_resolution_deg: f32) -> MomentsResult<Self> {
        if n_samples < 4 || n_samples % 2 != 0 {
            return Err(MomentsError::Config(format!(
                "sample count must be even and at least 4, got {}",
                n_samples
            )));
        }
        if index_beams && az_resolution_deg <= 0.0 {
            return Err(MomentsError::Config(
                "azimuth resolution must be positive when indexing beams".to_string(),
            ));
        }
        let angular_res = if index_beams {
            let per_45 = (45.0 / az_resolution_deg).round().max(1.0);
            45.0 / per_45
        } else {
            az_resolution_deg
        };
        Ok(Self {
            pulses: VecDeque::new(),
            capacity: 2 * n_samples + 2,
            n_samples,
            index_beams,
            angular_res,
            prev_az_index: None,
            pulses_since_beam: 0,
            stall_count: 0,
            last_az: None,
        })
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// Pushes a pulse to the front, evicting the oldest once over capacity.
    pub fn add_pulse(&mut self, pulse: Arc<Pulse>) {
        if let Some(last) = self.last_az {
            if az_diff(pulse.az(), last).abs() < STALL_DELTA_DEG {
                self.stall_count += 1;
            } else {
                self.stall_count = 0;
            }
        }
        self.last_az = Some(pulse.az());
        self.pulses.push_front(pulse);
        self.pulses_since_beam += 1;
        while self.pulses.len() > self.capacity {
            self.pulses.pop_back();
        }
    }

    /// Examines the most recent N pulses and returns a beam slice when one
    /// is ready. Inconsistent gate counts or PRTs across the window defer
    /// silently: the stream is simply not ready yet.
    pub fn beam_ready(&mut self) -> Option<BeamSlice> {
        if self.pulses.len() < self.n_samples {
            return None;
        }
        if !self.window_consistent() {
            return None;
        }

        // Midpoint pair of the most recent N, newest at front: index
        // n/2 is the earlier pulse, n/2 - 1 the later one.
        let mid_earlier = self.pulses[self.n_samples / 2].az();
        let mid_later = self.pulses[self.n_samples / 2 - 1].az();

        if !self.index_beams {
            if self.pulses_since_beam >= self.n_samples {
                return Some(self.take_slice(condition_az(mid_later), false));
            }
            return None;
        }

        // Antenna stalled: accept the midpoint azimuth as-is.
        if self.stall_count > 16 * self.n_samples {
            self.stall_count = 0;
            return Some(self.take_slice(condition_az(mid_later), false));
        }

        let delta = az_diff(mid_later, mid_earlier).abs();
        if delta > self.angular_res {
            return None;
        }

        let res = self.angular_res;
        let n_az = (360.0 / res).round() as i64;
        let mut az_index = (mid_earlier / res).round() as i64;
        if az_index >= n_az {
            az_index -= n_az;
        }
        if self.prev_az_index == Some(az_index) {
            return None;
        }

        let target = condition_az(az_index as f32 * res);

        let bracketed = if mid_earlier <= target && mid_later >= target {
            // clockwise rotation
            true
        } else if mid_earlier >= target && mid_later <= target {
            // counterclockwise rotation
            true
        } else if target == 0.0 {
            // wraparound through north, either direction
            (mid_earlier > 360.0 - res && mid_later < res)
                || (mid_later > 360.0 - res && mid_earlier < res)
        } else {
            false
        };

        if !bracketed {
            return None;
        }

        self.prev_az_index = Some(az_index);
        Some(self.take_slice(target, true))
    }

    fn window_consistent(&self) -> bool {
        let newest = &self.pulses[0];
        let n_gates = newest.n_gates();
        let prt = newest.prt();
        self.pulses
            .iter()
            .take(self.n_samples)
            .all(|p| p.n_gates() == n_gates && (p.prt() - prt).abs() <= PRT_TOLERANCE)
    }

    fn take_slice(&mut self, target_az: f32, indexed: bool) -> BeamSlice {
        let mut pulses: Vec<Arc<Pulse>> = self
            .pulses
            .iter()
            .take(self.n_samples)
            .cloned()
            .collect();
        pulses.reverse(); // oldest first
        let mid = &pulses[self.n_samples / 2];
        let slice = BeamSlice {
            target_az,
            el: mid.el(),
            time: mid.time(),
            prt: mid.prt(),
            indexed,
            pulses,
        };
        self.pulses_since_beam = 0;
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::PulseHeader;
    use num_complex::Complex32;

    fn make_pulse(seq: u64, az: f32, n_gates: usize, prt: f64) -> Arc<Pulse> {
        let header = PulseHeader {
            seq_num: seq,
            time: 1000.0 + seq as f64 * prt,
            prt,
            az: condition_az(az),
            el: 0.5,
            n_gates,
            n_channels: 1,
            hv_flag: seq % 2 == 0,
        };
        let iq = vec![vec![Complex32::new(0.1, 0.0); n_gates]];
        Arc::new(Pulse::new(header, iq).unwrap())
    }

    fn sweep(window: &mut PulseWindow, start_az: f32, step: f32, count: usize) -> Vec<BeamSlice> {
        let mut slices = Vec::new();
        for i in 0..count {
            window.add_pulse(make_pulse(i as u64, start_az + step * i as f32, 16, 0.001));
            if let Some(slice) = window.beam_ready() {
                slices.push(slice);
            }
        }
        slices
    }

    #[test]
    fn indexed_readiness_fires_on_target_azimuth() {
        let mut window = PulseWindow::new(8, true, 1.0).unwrap();
        let slices = sweep(&mut window, 30.0, 0.1, 60);
        assert!(!slices.is_empty());
        for slice in &slices {
            assert_eq!(slice.pulses.len(), 8);
            assert!(slice.indexed);
            let frac = slice.target_az.rem_euclid(1.0);
            assert!(frac < 1e-3 || frac > 1.0 - 1e-3);
        }
    }

    #[test]
    fn readiness_fires_through_north_wraparound() {
        let mut window = PulseWindow::new(8, true, 1.0).unwrap();
        // clockwise through 359 -> 0 -> 1
        let slices = sweep(&mut window, 358.5, 0.1, 50);
        assert!(slices.iter().any(|s| s.target_az == 0.0));
    }

    #[test]
    fn readiness_defers_between_target_azimuths() {
        let mut window = PulseWindow::new(8, true, 1.0).unwrap();
        // Eight pulses bracket only azimuths strictly inside (10.2, 10.9).
        for i in 0..8 {
            window.add_pulse(make_pulse(i, 10.2 + 0.1 * i as f32, 16, 0.001));
        }
        assert!(window.beam_ready().is_none());
    }

    #[test]
    fn mismatched_gate_counts_defer_silently() {
        let mut window = PulseWindow::new(8, true, 1.0).unwrap();
        for i in 0..4 {
            window.add_pulse(make_pulse(i, 19.6 + 0.1 * i as f32, 16, 0.001));
        }
        for i in 4..8 {
            window.add_pulse(make_pulse(i, 19.6 + 0.1 * i as f32, 32, 0.001));
        }
        assert!(window.beam_ready().is_none());
    }

    #[test]
    fn non_indexed_mode_fires_every_n_pulses() {
        let mut window = PulseWindow::new(8, false, 1.0).unwrap();
        let mut count = 0;
        for i in 0..32 {
            window.add_pulse(make_pulse(i, 10.0 + 0.05 * i as f32, 16, 0.001));
            if window.beam_ready().is_some() {
                count += 1;
            }
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn stalled_antenna_eventually_fires() {
        let mut window = PulseWindow::new(4, true, 1.0).unwrap();
        let mut fired = false;
        // constant azimuth between beam targets, so bracketing never fires
        for i in 0..(16 * 4 + 8) {
            window.add_pulse(make_pulse(i, 10.4, 16, 0.001));
            if window.beam_ready().is_some() {
                fired = true;
                break;
            }
        }
        assert!(fired);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut window = PulseWindow::new(8, false, 1.0).unwrap();
        for i in 0..100 {
            window.add_pulse(make_pulse(i, 10.0, 16, 0.001));
        }
        assert!(window.len() <= 2 * 8 + 2);
    }
}
