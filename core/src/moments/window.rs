//! Precomputed window tapers for spectral estimation.
//!
//! Coefficients are normalized so the window has unit RMS, which keeps
//! total power comparable between windowed and rectangular spectra.

use crate::config::WindowKind;
use num_complex::Complex32;
use std::f64::consts::PI;

pub struct Taper {
    kind: WindowKind,
    coeffs: Vec<f32>,
}

impl Taper {
    pub fn new(kind: WindowKind, n_samples: usize) -> Self {
        let coeffs = match kind {
            WindowKind::Rect => vec![1.0; n_samples],
            WindowKind::Hanning => normalize(hanning(n_samples)),
            WindowKind::Blackman => normalize(blackman(n_samples)),
        };
        Self { kind, coeffs }
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Element-wise multiply; the rectangular window is an identity copy.
    pub fn apply(&self, iq: &[Complex32]) -> Vec<Complex32> {
        if self.kind == WindowKind::Rect {
            return iq.to_vec();
        }
        iq.iter()
            .zip(self.coeffs.iter())
            .map(|(&sample, &w)| sample * w)
            .collect()
    }
}

fn hanning(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let ang = 2.0 * PI * ((i as f64 + 0.5) / n as f64 - 0.5);
            0.5 * (ang.cos() + 1.0)
        })
        .collect()
}

fn blackman(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let pos = ((n as f64 + 1.0) / 2.0 + i as f64) / n as f64;
            0.42 + 0.5 * (2.0 * PI * pos).cos() + 0.08 * (4.0 * PI * pos).cos()
        })
        .collect()
}

fn normalize(raw: Vec<f64>) -> Vec<f32> {
    let sum_sq: f64 = raw.iter().map(|w| w * w).sum();
    let rms = (sum_sq / raw.len() as f64).sqrt();
    raw.iter().map(|w| (w / rms) as f32).collect()
}
