use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use momentcore::beam::Beam;
use momentcore::cmd::{filter_spikes, BeamWindow, CmdClassifier};
use momentcore::fields::FIELD_TABLE;
use momentcore::moments::{compute_kdp, MomentsManager};
use momentcore::prelude::{is_missing, MISSING};
use momentcore::pulse::{Pulse, PulseWindow};
use momentcore::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-beam digest of the emitted fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamRecord {
    pub az: f32,
    pub el: f32,
    pub n_gates: usize,
    pub gates_flagged: usize,
    pub mean_dbz: f32,
    pub mean_vel: f32,
    pub mean_vel_filtered: f32,
    /// Per-field gate means, one entry per published output field.
    pub field_means: Vec<FieldMean>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMean {
    pub name: String,
    pub units: String,
    pub value: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub beams: Vec<BeamRecord>,
    pub gates_flagged: usize,
    pub metrics: MetricsSnapshot,
}

/// Drives the whole pipeline over a pulse stream: pulse window, beam
/// assembly, moments, CMD classification, clutter and spike filtering,
/// and KDP for dual-pol modes.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn run_scan(&self, pulses: &[Arc<Pulse>]) -> anyhow::Result<ScanSummary> {
        let radar = &self.config.radar;
        let first = pulses.first().context("scan contains no pulses")?;
        let (_, mode) = radar
            .mode_for_prf(first.prf())
            .with_context(|| format!("no mode covers PRF {:.0} Hz", first.prf()))?;
        let mut mode = mode.clone();

        let mut manager = MomentsManager::new(&mode, radar)?;
        let mut pulse_window =
            PulseWindow::new(mode.n_samples, radar.index_beams, radar.az_resolution_deg)?;
        // a window width of 1 disables the classifier entirely
        let width = radar.cmd.window_width.max(1);
        let mut classifier = if width > 1 {
            Some(CmdClassifier::new(
                &radar.cmd,
                radar.az_resolution_deg,
                mode.gate_spacing_km,
            )?)
        } else {
            None
        };
        let apply_spike = radar.cmd.apply_spike_filter && classifier.is_some();
        let mut beam_window = BeamWindow::new(width)?;

        let metrics = MetricsRecorder::new();
        let log = LogManager::new();
        let mut summary = ScanSummary::default();

        for pulse in pulses {
            if pulse.prf() < mode.lower_prf || pulse.prf() > mode.upper_prf {
                // the PRF moved to another band: finish the beams
                // buffered under the old mode, then restart under the new
                while !beam_window.is_empty() {
                    emit_oldest(
                        &mut manager,
                        &mut beam_window,
                        apply_spike,
                        mode.dual_pol,
                        &metrics,
                        &mut summary,
                    )?;
                }
                let (_, next) = radar
                    .mode_for_prf(pulse.prf())
                    .with_context(|| format!("no mode covers PRF {:.0} Hz", pulse.prf()))?;
                mode = next.clone();
                manager = MomentsManager::new(&mode, radar)?;
                pulse_window =
                    PulseWindow::new(mode.n_samples, radar.index_beams, radar.az_resolution_deg)?;
                if classifier.is_some() {
                    classifier = Some(CmdClassifier::new(
                        &radar.cmd,
                        radar.az_resolution_deg,
                        mode.gate_spacing_km,
                    )?);
                }
            }
            metrics.record_pulse();
            pulse_window.add_pulse(pulse.clone());
            while let Some(slice) = pulse_window.beam_ready() {
                let mut beam = Beam::new(slice, mode.dual_pol, mode.invert_hv_flag)?;
                // a beam that cannot be processed is dropped, not fatal
                if let Err(err) = manager.compute_moments(&mut beam) {
                    metrics.record_error();
                    log.record_skipped_beam(beam.az(), &err.to_string());
                    continue;
                }
                metrics.record_beam();
                log.record_beam(beam.az(), beam.el(), beam.n_gates());
                beam_window.push(beam);
                if beam_window.is_full() {
                    let center = beam_window.center();
                    if let Some(classifier) = &classifier {
                        classifier.classify(beam_window.beams_mut(), center)?;
                    }
                    emit_oldest(
                        &mut manager,
                        &mut beam_window,
                        apply_spike,
                        mode.dual_pol,
                        &metrics,
                        &mut summary,
                    )?;
                }
            }
        }
        // trailing beams never reach the center slot again; they go out
        // with whatever classification they picked up there
        while !beam_window.is_empty() {
            emit_oldest(
                &mut manager,
                &mut beam_window,
                apply_spike,
                mode.dual_pol,
                &metrics,
                &mut summary,
            )?;
        }

        summary.metrics = metrics.snapshot();
        summary.gates_flagged = summary.metrics.gates_flagged;
        log.record_scan(summary.beams.len(), summary.gates_flagged);
        Ok(summary)
    }
}

fn emit_oldest(
    manager: &mut MomentsManager,
    beam_window: &mut BeamWindow,
    apply_spike: bool,
    dual_pol: bool,
    metrics: &MetricsRecorder,
    summary: &mut ScanSummary,
) -> anyhow::Result<()> {
    let Some(mut beam) = beam_window.pop_oldest() else {
        return Ok(());
    };
    manager.filter_clutter(&mut beam)?;
    if apply_spike {
        filter_spikes(beam.fields_mut());
    }
    if dual_pol {
        let ranges: Vec<f32> = (0..beam.n_gates())
            .map(|gate| manager.gate_range_km(gate))
            .collect();
        compute_kdp(beam.fields_mut(), &ranges)?;
    }

    let flagged = beam.fields().iter().filter(|f| f.cmd_flag).count();
    metrics.record_emitted(flagged);
    summary.beams.push(BeamRecord {
        az: beam.az(),
        el: beam.el(),
        n_gates: beam.n_gates(),
        gates_flagged: flagged,
        mean_dbz: mean_field(&beam, |f| f.dbz),
        mean_vel: mean_field(&beam, |f| f.vel),
        mean_vel_filtered: mean_field(&beam, |f| f.vel_filtered),
        field_means: FIELD_TABLE
            .iter()
            .map(|desc| FieldMean {
                name: desc.name.to_string(),
                units: desc.units.to_string(),
                value: mean_field(&beam, desc.get),
            })
            .collect(),
    });
    Ok(())
}

fn mean_field(beam: &Beam, get: impl Fn(&momentcore::fields::Fields) -> f32) -> f32 {
    let values: Vec<f32> = beam
        .fields()
        .iter()
        .map(&get)
        .filter(|&v| !is_missing(v))
        .collect();
    if values.is_empty() {
        MISSING
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
