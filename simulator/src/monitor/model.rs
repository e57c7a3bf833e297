use crate::workflow::runner::{BeamRecord, ScanSummary};
use momentcore::telemetry::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// What the monitor endpoint publishes after a scan.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitorModel {
    pub beams_emitted: usize,
    pub gates_flagged: usize,
    pub records: Vec<BeamRecord>,
    pub metrics: MetricsSnapshot,
    pub scenario: Option<String>,
}

impl MonitorModel {
    pub fn from_summary(summary: &ScanSummary, scenario: Option<String>) -> Self {
        Self {
            beams_emitted: summary.beams.len(),
            gates_flagged: summary.gates_flagged,
            records: summary.beams.clone(),
            metrics: summary.metrics,
            scenario,
        }
    }
}
