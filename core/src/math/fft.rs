use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};

/// Helper that wraps a planned `rustfft` transform for reuse across gates.
pub struct FftHelper {
    fft: std::sync::Arc<dyn Fft<f32>>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self { fft }
    }

    pub fn size(&self) -> usize {
        self.fft.len()
    }

    /// Forward transform of one gate's IQ series. Input shorter than the
    /// planned size is zero-padded; longer input is truncated.
    pub fn forward(&self, input: &[Complex32]) -> Vec<Complex32> {
        let size = self.fft.len();
        let mut buffer: Vec<Complex32> = input.iter().copied().take(size).collect();
        buffer.resize(size, Complex32::zero());
        let mut scratch = vec![Complex32::zero(); self.fft.get_inplace_scratch_len()];
        self.fft.process_with_scratch(&mut buffer, &mut scratch);
        buffer
    }

    /// Per-bin magnitudes of the forward transform, normalized by 1/sqrt(N)
    /// so that mean spectral power equals mean time-domain power.
    pub fn magnitudes(&self, input: &[Complex32]) -> Vec<f32> {
        let norm = 1.0 / (self.fft.len() as f32).sqrt();
        self.forward(input)
            .iter()
            .map(|c| c.norm() * norm)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_helper_returns_planned_length() {
        let helper = FftHelper::new(8);
        let input = vec![Complex32::new(1.0, 0.0); 8];
        assert_eq!(helper.forward(&input).len(), 8);
        assert_eq!(helper.size(), 8);
    }

    #[test]
    fn constant_input_concentrates_in_dc_bin() {
        let helper = FftHelper::new(8);
        let input = vec![Complex32::new(1.0, 0.0); 8];
        let mags = helper.magnitudes(&input);
        assert!((mags[0] - 8.0f32.sqrt()).abs() < 1e-4);
        for &m in &mags[1..] {
            assert!(m < 1e-4);
        }
    }

    #[test]
    fn magnitudes_preserve_mean_power() {
        let input: Vec<Complex32> = (0..8)
            .map(|i| Complex32::new(i as f32 * 0.3 - 1.0, (i as f32 * 0.7).sin()))
            .collect();
        let time_power: f32 = input.iter().map(|c| c.norm_sqr()).sum::<f32>() / 8.0;
        let helper = FftHelper::new(8);
        let spec_power: f32 = helper.magnitudes(&input).iter().map(|m| m * m).sum::<f32>() / 8.0;
        assert!((time_power - spec_power).abs() / time_power < 1e-4);
    }
}
