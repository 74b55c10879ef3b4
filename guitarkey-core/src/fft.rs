//! # Fast Fourier Transform (FFT) Module
//!
//! Turns one block of samples into a magnitude spectrum for the frequency
//! estimator.
//!
//! ## Features
//! - FFT using RustFFT, planned once per block length
//! - Hamming windowing for reduced spectral leakage
//! - Magnitudes for the non-negative half of the spectrum only

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Builds a Hamming window of length `n`.
///
/// Uses the periodic form `0.54 - 0.46 * cos(2 * pi * i / n)`, the usual
/// choice for spectral analysis. Windows of length zero or one are all ones.
pub fn hamming_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let len = n as f32;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / len).cos())
        .collect()
}

/// Computes magnitude spectra for fixed-length blocks.
///
/// The FFT plan and the window are cached for the current block length. A
/// block of a different length replaces both.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
    fft: Option<Arc<dyn Fft<f32>>>,
    window: Vec<f32>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("block_len", &self.window.len())
            .finish()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            fft: None,
            window: Vec::new(),
        }
    }

    fn plan_for(&mut self, len: usize) -> Arc<dyn Fft<f32>> {
        if let Some(fft) = &self.fft {
            if self.window.len() == len {
                return Arc::clone(fft);
            }
        }
        log::debug!("Planning FFT for block length {}", len);
        let fft = self.planner.plan_fft_forward(len);
        self.window = hamming_window(len);
        self.fft = Some(Arc::clone(&fft));
        fft
    }

    /// Windows `signal` and returns the magnitudes of bins `0..len / 2`.
    ///
    /// Bin `k` corresponds to `k * sample_rate / len` Hz. An empty signal
    /// yields an empty spectrum.
    pub fn magnitudes(&mut self, signal: &[f32]) -> Vec<f32> {
        let len = signal.len();
        if len == 0 {
            return Vec::new();
        }
        let fft = self.plan_for(len);

        let mut buffer: Vec<Complex<f32>> = signal
            .iter()
            .zip(self.window.iter())
            .map(|(&sample, &w)| Complex { re: sample * w, im: 0.0 })
            .collect();

        fft.process(&mut buffer);

        buffer
            .iter()
            .take(len / 2)
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_window_shape() {
        let window = hamming_window(8);
        assert_eq!(window.len(), 8);
        assert!((window[0] - 0.08).abs() < 1e-6);
        assert!((window[4] - 1.0).abs() < 1e-6);
        // Periodic: symmetric around n / 2, no repeated 0.08 at the end.
        assert!((window[1] - window[7]).abs() < 1e-6);
        assert!((window[7] - 0.08).abs() > 0.1);
        assert_eq!(hamming_window(1), vec![1.0]);
        assert!(hamming_window(0).is_empty());
    }

    #[test]
    fn test_magnitudes_half_length() {
        let mut analyzer = SpectrumAnalyzer::new();
        let spectrum = analyzer.magnitudes(&vec![0.25; 64]);
        assert_eq!(spectrum.len(), 32);
        // A constant signal puts all of its energy in the DC bin.
        let peak = spectrum
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(peak.0, 0);
    }

    #[test]
    fn test_replans_on_length_change() {
        let mut analyzer = SpectrumAnalyzer::new();
        assert_eq!(analyzer.magnitudes(&vec![0.0; 128]).len(), 64);
        assert_eq!(analyzer.magnitudes(&vec![0.0; 100]).len(), 50);
        assert!(analyzer.magnitudes(&[]).is_empty());
    }
}
