//! Sliding window of beams for the CMD classifier.
//!
//! Beams enter at the back, are classified when they reach the center
//! slot, and leave at the front once they have served as trailing
//! context. The window owns its beams; pulse data stays shared through
//! the beams' reference counts.

use crate::beam::Beam;
use crate::prelude::{MomentsError, MomentsResult};

pub struct BeamWindow {
    /// Oldest first; widths are small, so front removal is a short shift.
    beams: Vec<Beam>,
    width: usize,
}

impl BeamWindow {
    /// Width must be odd; a width of 1 gives a pass-through window with
    /// no azimuthal context.
    pub fn new(width: usize) -> MomentsResult<Self> {
        if width == 0 || width % 2 == 0 {
            return Err(MomentsError::Config(format!(
                "beam window width must be odd, got {}",
                width
            )));
        }
        Ok(Self {
            beams: Vec::with_capacity(width),
            width,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    pub fn push(&mut self, beam: Beam) {
        self.beams.push(beam);
    }

    /// True when a beam occupies the center slot with full context on
    /// both sides.
    pub fn is_full(&self) -> bool {
        self.beams.len() == self.width
    }

    pub fn center(&self) -> usize {
        self.width / 2
    }

    pub fn beams_mut(&mut self) -> &mut [Beam] {
        &mut self.beams
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    /// Removes and returns the oldest beam; called once the window is
    /// full so capacity stays at `width`.
    pub fn pop_oldest(&mut self) -> Option<Beam> {
        if self.beams.is_empty() {
            None
        } else {
            Some(self.beams.remove(0))
        }
    }

    /// Empties the window at end of stream, oldest first.
    pub fn drain(&mut self) -> Vec<Beam> {
        self.beams.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::{BeamSlice, Pulse, PulseHeader};
    use num_complex::Complex32;
    use std::sync::Arc;

    fn beam(az: f32) -> Beam {
        let pulses = (0..4)
            .map(|p| {
                let header = PulseHeader {
                    seq_num: p,
                    time: 1000.0,
                    prt: 0.001,
                    az,
                    el: 0.5,
                    n_gates: 2,
                    n_channels: 1,
                    hv_flag: true,
                };
                Arc::new(Pulse::new(header, vec![vec![Complex32::new(0.1, 0.0); 2]]).unwrap())
            })
            .collect();
        Beam::new(
            BeamSlice {
                target_az: az,
                el: 0.5,
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

    #[test]
    fn even_width_is_rejected() {
        assert!(BeamWindow::new(4).is_err());
        assert!(BeamWindow::new(0).is_err());
        assert!(BeamWindow::new(5).is_ok());
    }

    #[test]
    fn window_fills_then_cycles_oldest_first() {
        let mut window = BeamWindow::new(3).unwrap();
        for az in [10.0, 11.0, 12.0] {
            window.push(beam(az));
        }
        assert!(window.is_full());
        assert_eq!(window.beams()[window.center()].az(), 11.0);
        let emitted = window.pop_oldest().unwrap();
        assert_eq!(emitted.az(), 10.0);
        window.push(beam(13.0));
        assert_eq!(window.beams()[window.center()].az(), 12.0);
    }

    #[test]
    fn reads_take_only_a_shared_borrow() {
        let mut window = BeamWindow::new(3).unwrap();
        for az in [1.0, 2.0, 3.0] {
            window.push(beam(az));
        }
        // the slice stays borrowed while the other accessors are called
        let beams = window.beams();
        assert_eq!(beams[window.center()].az(), 2.0);
        assert_eq!(beams.len(), window.len());
    }

    #[test]
    fn drain_returns_remaining_in_order() {
        let mut window = BeamWindow::new(5).unwrap();
        window.push(beam(1.0));
        window.push(beam(2.0));
        let rest = window.drain();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].az(), 1.0);
        assert!(window.is_empty());
    }
}
