use crate::generator::profile::ScenarioConfig;
use anyhow::Context;
use momentcore::config::RadarConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Radar configuration plus the scenario the offline driver should run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub radar: RadarConfig,
    pub scenario: ScenarioConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(beams: usize, seed: u64) -> Self {
        Self {
            radar: RadarConfig::default(),
            scenario: ScenarioConfig {
                n_beams: beams,
                seed,
                ..ScenarioConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_seeds_the_scenario() {
        let cfg = WorkflowConfig::from_args(4, 99);
        assert_eq!(cfg.scenario.n_beams, 4);
        assert_eq!(cfg.scenario.seed, 99);
        assert_eq!(cfg.radar.modes[0].n_samples, 64);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"radar:\n  wavelength_cm: 5.0\nscenario:\n  n_beams: 3\n  weather_vel: 6.5\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.radar.wavelength_cm, 5.0);
        assert_eq!(cfg.scenario.n_beams, 3);
        assert!((cfg.scenario.weather_vel - 6.5).abs() < 1e-6);
    }
}
