use log::{info, warn};

/// Thin facade over the `log` crate so callers report pipeline events
/// without choosing levels themselves.
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record_beam(&self, az: f32, el: f32, n_gates: usize) {
        info!("beam az {:.2} el {:.2} gates {}", az, el, n_gates);
    }

    pub fn record_scan(&self, beams: usize, gates_flagged: usize) {
        info!("scan complete: {} beams, {} gates flagged", beams, gates_flagged);
    }

    pub fn record_skipped_beam(&self, az: f32, reason: &str) {
        warn!("beam az {:.2} skipped: {}", az, reason);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
