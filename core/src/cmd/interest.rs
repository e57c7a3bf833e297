//! Piecewise-linear interest maps and the weighted fusion accumulator.

use crate::config::{CmdConfig, InterestMapSpec};
use crate::prelude::{is_missing, MomentsError, MomentsResult};

/// A validated interest map: value breakpoints strictly increasing,
/// interest clamped to the end segments outside the breakpoint range.
#[derive(Debug, Clone)]
pub struct InterestMap {
    name: &'static str,
    values: Vec<f32>,
    interests: Vec<f32>,
    weight: f32,
}

impl InterestMap {
    pub fn from_spec(name: &'static str, spec: &InterestMapSpec) -> MomentsResult<Self> {
        if spec.points.len() < 2 {
            return Err(MomentsError::Config(format!(
                "interest map {} needs at least 2 points",
                name
            )));
        }
        if spec.weight < 0.0 {
            return Err(MomentsError::Config(format!(
                "interest map {} has negative weight",
                name
            )));
        }
        let values: Vec<f32> = spec.points.iter().map(|p| p.value).collect();
        if values.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(MomentsError::Config(format!(
                "interest map {} values must be strictly increasing",
                name
            )));
        }
        Ok(Self {
            name,
            values,
            interests: spec.points.iter().map(|p| p.interest).collect(),
            weight: spec.weight,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Interest for a value, or None when the input is missing.
    pub fn interest(&self, value: f32) -> Option<f32> {
        if is_missing(value) {
            return None;
        }
        if value <= self.values[0] {
            return Some(self.interests[0]);
        }
        let last = self.values.len() - 1;
        if value >= self.values[last] {
            return Some(self.interests[last]);
        }
        let upper = self.values.partition_point(|&v| v < value);
        let lower = upper - 1;
        let frac = (value - self.values[lower]) / (self.values[upper] - self.values[lower]);
        Some(self.interests[lower] + frac * (self.interests[upper] - self.interests[lower]))
    }
}

/// Accumulates `sum(interest * weight) / sum(weight)` over the maps
/// whose input was actually present.
#[derive(Default)]
pub struct InterestSum {
    sum_interest: f64,
    sum_weight: f64,
}

impl InterestSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates the map and accumulates it; missing inputs and
    /// zero-weight maps contribute nothing.
    pub fn add(&mut self, map: &InterestMap, value: f32) {
        if map.weight <= 0.0 {
            return;
        }
        if let Some(interest) = map.interest(value) {
            self.accumulate(interest, map.weight);
        }
    }

    /// Accumulates a precomputed interest, used by the max-composite
    /// terms.
    pub fn accumulate(&mut self, interest: f32, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        self.sum_interest += (interest * weight) as f64;
        self.sum_weight += weight as f64;
    }

    pub fn result(&self) -> Option<f32> {
        if self.sum_weight <= 0.0 {
            None
        } else {
            Some((self.sum_interest / self.sum_weight) as f32)
        }
    }
}

/// The full map bank built from [`CmdConfig`], validated once at startup.
#[derive(Debug, Clone)]
pub struct CmdInterestMaps {
    pub tdbz: InterestMap,
    pub spin: InterestMap,
    pub max_tdbz_spin_weight: f32,
    pub width: InterestMap,
    pub wx_peak_sep: InterestMap,
    pub max_width_sep_weight: f32,
    pub vel_sdev: InterestMap,
    pub zdr_sdev: InterestMap,
    pub rhohv_sdev: InterestMap,
    pub phidp_sdev: InterestMap,
    pub ratio_narrow: InterestMap,
    pub ratio_wide: InterestMap,
}

impl CmdInterestMaps {
    pub fn from_config(config: &CmdConfig) -> MomentsResult<Self> {
        Ok(Self {
            tdbz: InterestMap::from_spec("tdbz", &config.tdbz_map)?,
            spin: InterestMap::from_spec("spin", &config.spin_map)?,
            max_tdbz_spin_weight: config.max_tdbz_spin_weight,
            width: InterestMap::from_spec("width", &config.width_map)?,
            wx_peak_sep: InterestMap::from_spec("wx_peak_sep", &config.wx_peak_sep_map)?,
            max_width_sep_weight: config.max_width_sep_weight,
            vel_sdev: InterestMap::from_spec("vel_sdev", &config.vel_sdev_map)?,
            zdr_sdev: InterestMap::from_spec("zdr_sdev", &config.zdr_sdev_map)?,
            rhohv_sdev: InterestMap::from_spec("rhohv_sdev", &config.rhohv_sdev_map)?,
            phidp_sdev: InterestMap::from_spec("phidp_sdev", &config.phidp_sdev_map)?,
            ratio_narrow: InterestMap::from_spec("ratio_narrow", &config.ratio_narrow_map)?,
            ratio_wide: InterestMap::from_spec("ratio_wide", &config.ratio_wide_map)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::MISSING;

    fn map(points: Vec<(f32, f32)>, weight: f32) -> InterestMap {
        InterestMap::from_spec("test", &InterestMapSpec::new(points, weight)).unwrap()
    }

    #[test]
    fn interest_interpolates_and_clamps() {
        let m = map(vec![(0.0, 0.0), (10.0, 1.0)], 1.0);
        assert_eq!(m.interest(-5.0), Some(0.0));
        assert_eq!(m.interest(5.0), Some(0.5));
        assert_eq!(m.interest(20.0), Some(1.0));
        assert_eq!(m.interest(MISSING), None);
    }

    #[test]
    fn non_monotonic_points_are_a_config_error() {
        let spec = InterestMapSpec::new(vec![(0.0, 0.0), (5.0, 0.5), (5.0, 1.0)], 1.0);
        assert!(matches!(
            InterestMap::from_spec("bad", &spec),
            Err(MomentsError::Config(_))
        ));
    }

    #[test]
    fn fusion_skips_missing_inputs() {
        let a = map(vec![(0.0, 0.0), (10.0, 1.0)], 1.0);
        let b = map(vec![(0.0, 1.0), (10.0, 0.0)], 3.0);
        let mut sum = InterestSum::new();
        sum.add(&a, 10.0); // interest 1, weight 1
        sum.add(&b, MISSING); // skipped entirely
        assert_eq!(sum.result(), Some(1.0));
    }

    #[test]
    fn empty_fusion_yields_none() {
        assert_eq!(InterestSum::new().result(), None);
    }

    #[test]
    fn default_config_maps_all_validate() {
        assert!(CmdInterestMaps::from_config(&CmdConfig::default()).is_ok());
    }
}
