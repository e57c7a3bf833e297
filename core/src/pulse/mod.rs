//! Pulse records and the bounded pulse window feeding beam assembly.

pub mod window;

pub use window::{BeamSlice, PulseWindow};

use crate::prelude::{MomentsError, MomentsResult};
use num_complex::Complex32;

/// Header attributes of one transmission-return record.
#[derive(Debug, Clone, Copy)]
pub struct PulseHeader {
    pub seq_num: u64,
    /// Seconds since epoch, double precision.
    pub time: f64,
    /// Inter-pulse interval, seconds.
    pub prt: f64,
    pub az: f32,
    pub el: f32,
    pub n_gates: usize,
    pub n_channels: usize,
    /// True when the transmit polarization was horizontal.
    pub hv_flag: bool,
}

/// One digitized radar pulse. Immutable once constructed; shared between
/// beams through `Arc`, so a pulse is freed exactly when the last beam
/// referencing it is dropped.
#[derive(Debug)]
pub struct Pulse {
    header: PulseHeader,
    /// Per-channel IQ, each of length `n_gates`.
    iq: Vec<Vec<Complex32>>,
}

impl Pulse {
    pub fn new(header: PulseHeader, iq: Vec<Vec<Complex32>>) -> MomentsResult<Self> {
        if iq.len() != header.n_channels {
            return Err(MomentsError::InvalidInput(format!(
                "pulse {}: expected {} channels, got {}",
                header.seq_num,
                header.n_channels,
                iq.len()
            )));
        }
        for (chan, series) in iq.iter().enumerate() {
            if series.len() != header.n_gates {
                return Err(MomentsError::InvalidInput(format!(
                    "pulse {} channel {}: expected {} gates, got {}",
                    header.seq_num,
                    chan,
                    header.n_gates,
                    series.len()
                )));
            }
        }
        Ok(Self { header, iq })
    }

    pub fn header(&self) -> &PulseHeader {
        &self.header
    }

    pub fn seq_num(&self) -> u64 {
        self.header.seq_num
    }

    pub fn time(&self) -> f64 {
        self.header.time
    }

    pub fn prt(&self) -> f64 {
        self.header.prt
    }

    pub fn prf(&self) -> f32 {
        if self.header.prt > 0.0 {
            (1.0 / self.header.prt) as f32
        } else {
            0.0
        }
    }

    pub fn az(&self) -> f32 {
        self.header.az
    }

    pub fn el(&self) -> f32 {
        self.header.el
    }

    pub fn n_gates(&self) -> usize {
        self.header.n_gates
    }

    pub fn n_channels(&self) -> usize {
        self.header.n_channels
    }

    pub fn is_horizontal(&self) -> bool {
        self.header.hv_flag
    }

    /// IQ series for one channel, one sample per gate.
    pub fn iq(&self, channel: usize) -> &[Complex32] {
        &self.iq[channel]
    }

    /// Single gate sample on a channel.
    pub fn gate_iq(&self, channel: usize, gate: usize) -> Complex32 {
        self.iq[channel][gate]
    }
}
