use anyhow::Context;
use momentcore::config::RadarConfig;
use momentcore::pulse::{Pulse, PulseHeader};
use num_complex::Complex32;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

/// Configuration for one synthetic scan.
///
/// The generator sweeps azimuth at a constant rate and fills every gate
/// with a weather tone over thermal noise; the configured gate span can
/// additionally carry a zero-Doppler clutter line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of indexed beams the sweep should cover.
    pub n_beams: usize,
    pub n_gates: usize,
    pub seed: u64,
    pub start_az_deg: f32,
    pub el_deg: f32,
    pub prt_s: f64,
    /// Weather radial velocity, m/s, positive away from the radar.
    pub weather_vel: f32,
    /// Weather signal power at the receiver, dBm.
    pub weather_dbm: f32,
    /// Thermal noise power, dBm.
    pub noise_dbm: f32,
    /// Zero-Doppler clutter power, dBm; absent for a clean scan.
    pub clutter_dbm: Option<f32>,
    pub clutter_start_gate: usize,
    pub clutter_end_gate: usize,
    /// Fractional pulse-to-pulse clutter amplitude jitter, giving the
    /// clutter line a nonzero spectral width.
    pub clutter_jitter: f32,
    /// Differential reflectivity of the weather tone, dB, dual-pol only.
    pub zdr_db: f32,
    /// Two-way differential propagation phase of the weather tone, deg.
    pub differential_phase_deg: f32,
    pub description: Option<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            n_beams: 8,
            n_gates: 32,
            seed: 0,
            start_az_deg: 9.5,
            el_deg: 0.5,
            prt_s: 0.001,
            weather_vel: 10.0,
            weather_dbm: -40.0,
            noise_dbm: -77.0,
            clutter_dbm: None,
            clutter_start_gate: 8,
            clutter_end_gate: 16,
            clutter_jitter: 0.05,
            zdr_db: 0.0,
            differential_phase_deg: 0.0,
            description: None,
        }
    }
}

/// Synthesizes the pulse stream for one scan against the first mode of
/// the radar configuration.
pub fn build_scan(
    scenario: &ScenarioConfig,
    radar: &RadarConfig,
) -> anyhow::Result<Vec<Arc<Pulse>>> {
    let mode = radar
        .modes
        .first()
        .context("radar configuration has no modes")?;
    if scenario.n_gates == 0 {
        anyhow::bail!("scenario needs at least one gate");
    }

    let n_samples = mode.n_samples;
    let wavelength_m = radar.wavelength_m() as f64;
    let az_step = radar.az_resolution_deg / n_samples as f32;
    // two extra windows of slack so the pulse window primes before the
    // first target azimuth and drains past the last
    let total = n_samples
        .checked_mul(scenario.n_beams + 2)
        .context("overflow computing scan pulse count")?;

    let amp_h = 10.0f64.powf(scenario.weather_dbm as f64 / 20.0);
    let amp_v = amp_h * 10.0f64.powf(-(scenario.zdr_db as f64) / 20.0);
    let psi = (scenario.differential_phase_deg as f64).to_radians();
    let noise_sigma = (10.0f64.powf(scenario.noise_dbm as f64 / 10.0) / 2.0).sqrt();
    let clutter_amp = scenario
        .clutter_dbm
        .map(|dbm| 10.0f64.powf(dbm as f64 / 20.0));

    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let mut pulses = Vec::with_capacity(total);
    for p in 0..total {
        let horizontal = !mode.dual_pol || p % 2 == 0;
        let phase =
            -4.0 * PI * scenario.weather_vel as f64 * scenario.prt_s * p as f64 / wavelength_m;
        let tone = if horizontal {
            Complex32::new((amp_h * phase.cos()) as f32, (amp_h * phase.sin()) as f32)
        } else {
            let ph = phase + psi;
            Complex32::new((amp_v * ph.cos()) as f32, (amp_v * ph.sin()) as f32)
        };

        let mut gates = Vec::with_capacity(scenario.n_gates);
        for gate in 0..scenario.n_gates {
            let mut sample = tone + complex_noise(&mut rng, noise_sigma);
            if let Some(amp) = clutter_amp {
                if gate >= scenario.clutter_start_gate && gate < scenario.clutter_end_gate {
                    let jitter =
                        1.0 + scenario.clutter_jitter as f64 * (rng.gen::<f64>() * 2.0 - 1.0);
                    sample += Complex32::new((amp * jitter) as f32, 0.0);
                }
            }
            gates.push(sample);
        }

        let header = PulseHeader {
            seq_num: p as u64,
            time: 1.0e9 + p as f64 * scenario.prt_s,
            prt: scenario.prt_s,
            az: (scenario.start_az_deg + p as f32 * az_step).rem_euclid(360.0),
            el: scenario.el_deg,
            n_gates: scenario.n_gates,
            n_channels: 1,
            hv_flag: horizontal,
        };
        pulses.push(Arc::new(Pulse::new(header, vec![gates])?));
    }

    Ok(pulses)
}

fn complex_noise(rng: &mut StdRng, sigma: f64) -> Complex32 {
    // Box-Muller from two uniforms
    let u1: f64 = rng.gen::<f64>().max(1.0e-12);
    let u2: f64 = rng.gen();
    let radius = (-2.0 * u1.ln()).sqrt() * sigma;
    let angle = 2.0 * PI * u2;
    Complex32::new((radius * angle.cos()) as f32, (radius * angle.sin()) as f32)
}
