use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Pipeline counters, shared across stages behind a mutex.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pulses_ingested: usize,
    pub beams_formed: usize,
    pub beams_emitted: usize,
    pub gates_flagged: usize,
    pub errors: usize,
}

#[derive(Default)]
struct Metrics {
    pulses_ingested: usize,
    beams_formed: usize,
    beams_emitted: usize,
    gates_flagged: usize,
    errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_pulse(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.pulses_ingested += 1;
        }
    }

    pub fn record_beam(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.beams_formed += 1;
        }
    }

    pub fn record_emitted(&self, gates_flagged: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.beams_emitted += 1;
            metrics.gates_flagged += gates_flagged;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                pulses_ingested: metrics.pulses_ingested,
                beams_formed: metrics.beams_formed,
                beams_emitted: metrics.beams_emitted,
                gates_flagged: metrics.gates_flagged,
                errors: metrics.errors,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
