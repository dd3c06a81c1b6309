use std::error::Error;
use std::f64::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::error::{PipelineError, PipelineResult};

pub type DynError = Box<dyn Error + Send + Sync>;

pub struct FftHelper {
    len: usize,
    pub forward_r2c: Arc<dyn RealToComplex<f64>>,
}

impl FftHelper {
    pub fn new(len: usize) -> Self {
        let mut planner_r2c = RealFftPlanner::new();
        let forward_r2c = planner_r2c.plan_fft_forward(len);
        Self { len, forward_r2c }
    }

    pub fn half_spectrum_len(&self) -> usize {
        self.len / 2 + 1
    }

    pub fn forward_r2c_process(
        &self,
        input: &mut [f64],
        output: &mut [Complex<f64>],
    ) -> PipelineResult<()> {
        if input.len() != self.len {
            return Err(PipelineError::Fft(format!(
                "R2C input length {} does not match FFT length {}",
                input.len(),
                self.len
            )));
        }
        if output.len() != self.half_spectrum_len() {
            return Err(PipelineError::Fft(format!(
                "R2C output length {} does not match half-spectrum length {}",
                output.len(),
                self.half_spectrum_len()
            )));
        }
        self.forward_r2c
            .process(input, output)
            .map_err(|e| PipelineError::Fft(e.to_string()))
    }
}

pub fn hanning_window(len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    let mut window = vec![0.0; len];
    for i in 0..len {
        window[i] = 0.5 * (1.0 - (2.0 * PI * i as f64 / (len as f64 - 1.0)).cos());
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hanning_is_symmetric_with_zero_edges() {
        let w = hanning_window(9);
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(w[8], 0.0, epsilon = 1e-15);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-15);
        for i in 0..9 {
            assert_relative_eq!(w[i], w[8 - i], epsilon = 1e-15);
        }
    }

    #[test]
    fn r2c_of_constant_is_dc_only() {
        let helper = FftHelper::new(8);
        let mut input = vec![1.0; 8];
        let mut output = vec![Complex::new(0.0, 0.0); helper.half_spectrum_len()];
        helper.forward_r2c_process(&mut input, &mut output).unwrap();
        assert_relative_eq!(output[0].re, 8.0, epsilon = 1e-12);
        for bin in &output[1..] {
            assert!(bin.norm() < 1e-12);
        }
    }

    #[test]
    fn r2c_rejects_wrong_lengths() {
        let helper = FftHelper::new(8);
        let mut input = vec![0.0; 7];
        let mut output = vec![Complex::new(0.0, 0.0); 5];
        assert!(matches!(
            helper.forward_r2c_process(&mut input, &mut output),
            Err(PipelineError::Fft(_))
        ));
    }
}
