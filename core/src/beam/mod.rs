//! A beam: N contiguous pulses plus the per-gate moment fields derived
//! from them.

use crate::fields::Fields;
use crate::moments::BeamSpectra;
use crate::prelude::{MomentsError, MomentsResult};
use crate::pulse::{BeamSlice, Pulse};
use std::sync::Arc;

/// One radial of data. Pulses are shared with the window that produced
/// them; a pulse is freed when its last referencing beam drops.
pub struct Beam {
    pulses: Vec<Arc<Pulse>>,
    az: f32,
    el: f32,
    time: f64,
    prt: f64,
    n_gates: usize,
    dual_pol: bool,
    fields: Vec<Fields>,
    /// Per-gate spectra cached by the moments pass for the later
    /// clutter-filter pass.
    spectra: Option<BeamSpectra>,
}

impl Beam {
    /// Builds a beam from a readiness slice. For dual-pol alternating
    /// transmission the pulse order is rotated so the first sample is the
    /// horizontal pulse; `invert_hv_flag` flips the sense of the per-pulse
    /// polarization flag.
    pub fn new(slice: BeamSlice, dual_pol: bool, invert_hv_flag: bool) -> MomentsResult<Self> {
        let mut pulses = slice.pulses;
        if pulses.is_empty() {
            return Err(MomentsError::InvalidInput(
                "beam slice contains no pulses".to_string(),
            ));
        }
        if dual_pol {
            if pulses.len() % 2 != 0 {
                return Err(MomentsError::InvalidInput(format!(
                    "dual-pol beam needs an even sample count, got {}",
                    pulses.len()
                )));
            }
            let first_is_h = pulses[0].is_horizontal() != invert_hv_flag;
            if !first_is_h {
                pulses.rotate_left(1);
            }
        }
        let n_gates = pulses[0].n_gates();
        let fields = vec![Fields::new(); n_gates];
        Ok(Self {
            az: slice.target_az,
            el: slice.el,
            time: slice.time,
            prt: slice.prt,
            n_gates,
            dual_pol,
            pulses,
            fields,
            spectra: None,
        })
    }

    pub fn az(&self) -> f32 {
        self.az
    }

    pub fn el(&self) -> f32 {
        self.el
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn prt(&self) -> f64 {
        self.prt
    }

    pub fn prf(&self) -> f64 {
        1.0 / self.prt
    }

    pub fn n_samples(&self) -> usize {
        self.pulses.len()
    }

    pub fn n_gates(&self) -> usize {
        self.n_gates
    }

    pub fn dual_pol(&self) -> bool {
        self.dual_pol
    }

    pub fn fields(&self) -> &[Fields] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [Fields] {
        &mut self.fields
    }

    pub fn set_spectra(&mut self, spectra: BeamSpectra) {
        self.spectra = Some(spectra);
    }

    pub fn spectra(&self) -> Option<&BeamSpectra> {
        self.spectra.as_ref()
    }

    /// Hands the cached spectra to the clutter-filter pass; the cache is
    /// not needed once the filtered fields are written.
    pub fn take_spectra(&mut self) -> Option<BeamSpectra> {
        self.spectra.take()
    }

    /// Time series for one gate across all pulses, channel 0.
    pub fn gate_iq(&self, gate: usize) -> Vec<num_complex::Complex32> {
        self.pulses.iter().map(|p| p.iq(0)[gate]).collect()
    }

    /// Interleaved H/V time series for one gate: even samples are the
    /// horizontal channel, odd samples the vertical. Valid only after the
    /// H-first rotation in `new`.
    pub fn gate_iq_hv(
        &self,
        gate: usize,
    ) -> (Vec<num_complex::Complex32>, Vec<num_complex::Complex32>) {
        let series = self.gate_iq(gate);
        let h = series.iter().step_by(2).copied().collect();
        let v = series.iter().skip(1).step_by(2).copied().collect();
        (h, v)
    }
}
