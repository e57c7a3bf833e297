use crate::prelude::is_missing;

/// Missing-aware running statistics over field slices.
pub struct StatsHelper;

impl StatsHelper {
    /// Mean of the non-missing values, if any.
    pub fn mean(values: &[f32]) -> Option<f32> {
        let mut sum = 0.0f64;
        let mut count = 0.0f64;
        for &v in values {
            if !is_missing(v) {
                sum += v as f64;
                count += 1.0;
            }
        }
        if count > 0.0 {
            Some((sum / count) as f32)
        } else {
            None
        }
    }

    /// Standard deviation of the non-missing values.
    ///
    /// Needs more than 2 contributing values, as the kernel statistics in
    /// the classifier do; degenerate negative variance yields None.
    pub fn sdev(values: &[f32]) -> Option<f32> {
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0.0f64;
        for &v in values {
            if !is_missing(v) {
                sum += v as f64;
                sum_sq += (v as f64) * (v as f64);
                count += 1.0;
            }
        }
        if count <= 2.0 {
            return None;
        }
        let mean = sum / count;
        let diff = sum_sq / count - mean * mean;
        if diff >= 0.0 {
            Some(diff.sqrt() as f32)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::MISSING;

    #[test]
    fn mean_skips_missing_values() {
        assert_eq!(StatsHelper::mean(&[1.0, MISSING, 3.0]), Some(2.0));
        assert_eq!(StatsHelper::mean(&[MISSING, MISSING]), None);
        assert_eq!(StatsHelper::mean(&[]), None);
    }

    #[test]
    fn sdev_requires_more_than_two_values() {
        assert_eq!(StatsHelper::sdev(&[1.0, 2.0]), None);
        let sd = StatsHelper::sdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-5);
    }

    #[test]
    fn sdev_of_constant_sequence_is_zero() {
        let sd = StatsHelper::sdev(&[3.0, 3.0, 3.0, 3.0]).unwrap();
        assert!(sd.abs() < 1e-6);
    }
}
