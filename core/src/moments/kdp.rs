//! Specific differential phase from the range gradient of PHIDP.
//!
//! Pure function over a beam's fields: no state is kept between calls.

use crate::fields::Fields;
use crate::prelude::{is_missing, MomentsError, MomentsResult, MISSING};

/// Gates in the slope window, centered on the gate of interest.
pub const KDP_N_GATES: usize = 7;

/// Valid phidp samples required in the window.
const MIN_VALID: usize = 4;

/// Computes KDP for every gate with enough valid PHIDP neighbors.
///
/// `ranges_km` must be strictly increasing and match the gate count.
/// The slope is fitted by SNR-weighted least squares, with each
/// neighbor's phase unwrapped to within a half turn of the center gate;
/// KDP is half the phase slope, in deg/km.
pub fn compute_kdp(fields: &mut [Fields], ranges_km: &[f32]) -> MomentsResult<()> {
    if ranges_km.len() != fields.len() {
        return Err(MomentsError::InvalidInput(format!(
            "range array has {} entries for {} gates",
            ranges_km.len(),
            fields.len()
        )));
    }
    if ranges_km.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(MomentsError::InvalidInput(
            "range array must be strictly increasing".to_string(),
        ));
    }
    let n_gates = fields.len();
    let half = KDP_N_GATES / 2;
    if n_gates < KDP_N_GATES {
        for f in fields.iter_mut() {
            f.kdp = MISSING;
        }
        return Ok(());
    }

    let kdp: Vec<f32> = (0..n_gates)
        .map(|gate| {
            if gate < half || gate + half >= n_gates {
                return MISSING;
            }
            slope_at(fields, ranges_km, gate, half)
                .map(|slope| slope / 2.0)
                .unwrap_or(MISSING)
        })
        .collect();

    for (f, &k) in fields.iter_mut().zip(kdp.iter()) {
        f.kdp = k;
    }
    Ok(())
}

/// SNR-weighted phase slope across the window around `gate`, deg/km.
fn slope_at(fields: &[Fields], ranges_km: &[f32], gate: usize, half: usize) -> Option<f32> {
    let center_phidp = fields[gate].phidp;
    if is_missing(center_phidp) {
        return None;
    }

    let mut samples: Vec<(f64, f64, f64)> = Vec::with_capacity(KDP_N_GATES);
    for ii in gate - half..=gate + half {
        let f = &fields[ii];
        if is_missing(f.phidp) {
            continue;
        }
        // unwrap relative to the center gate
        let mut phidp = f.phidp;
        if phidp - center_phidp > 180.0 {
            phidp -= 360.0;
        } else if phidp - center_phidp < -180.0 {
            phidp += 360.0;
        }
        let weight = if is_missing(f.snr) {
            1.0
        } else {
            10.0f64.powf(f.snr as f64 / 10.0)
        };
        samples.push((ranges_km[ii] as f64, phidp as f64, weight));
    }
    if samples.len() < MIN_VALID {
        return None;
    }

    let sum_w: f64 = samples.iter().map(|s| s.2).sum();
    let mean_x: f64 = samples.iter().map(|s| s.0 * s.2).sum::<f64>() / sum_w;
    let mean_y: f64 = samples.iter().map(|s| s.1 * s.2).sum::<f64>() / sum_w;
    let mut num = 0.0f64;
    let mut den = 0.0f64;
    for (x, y, w) in &samples {
        num += w * (x - mean_x) * (y - mean_y);
        den += w * (x - mean_x) * (x - mean_x);
    }
    if den <= 0.0 {
        return None;
    }
    Some((num / den) as f32)
}
