//! # Pitch Detection Module
//!
//! Estimates the dominant frequency of a single block of audio by picking the
//! strongest bin of its windowed magnitude spectrum.
//!
//! ## Features
//! - Peak-amplitude gate that skips the FFT for silent blocks
//! - Hamming window against spectral leakage
//! - Low-frequency cutoff to suppress DC and sub-audio content
//!
//! There is no sub-bin interpolation: the result is always a multiple of
//! `sample_rate / block_len`. Note classification has to tolerate that.

use crate::config::DetectorConfig;
use crate::error::PipelineError;
use crate::fft::SpectrumAnalyzer;
use crate::SampleBlock;

/// Finds the dominant frequency of sample blocks.
#[derive(Debug)]
pub struct FrequencyEstimator {
    amplitude_threshold: f32,
    min_frequency: f32,
    analyzer: SpectrumAnalyzer,
}

impl FrequencyEstimator {
    pub fn new(amplitude_threshold: f32, min_frequency: f32) -> Self {
        Self {
            amplitude_threshold,
            min_frequency,
            analyzer: SpectrumAnalyzer::new(),
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.amplitude_threshold, config.min_frequency)
    }

    /// Estimates the dominant frequency of `block` in Hz.
    ///
    /// # Returns
    /// * `Ok(Some(frequency))` - Frequency of the strongest bin above the cutoff
    /// * `Ok(None)` - No signal: the block is below the amplitude threshold,
    ///   or nothing above the cutoff carries energy
    /// * `Err(PipelineError::InvalidInput)` - Empty block, zero sample rate
    ///   or non-finite samples
    pub fn estimate(&mut self, block: &SampleBlock) -> Result<Option<f32>, PipelineError> {
        let samples = block.samples();
        let sample_rate = block.sample_rate();

        if samples.is_empty() {
            return Err(PipelineError::InvalidInput("sample block is empty".into()));
        }
        if sample_rate == 0 {
            return Err(PipelineError::InvalidInput("sample rate must be positive".into()));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(PipelineError::InvalidInput(format!(
                "non-finite sample at index {}",
                pos
            )));
        }

        // --- Noise gate on the peak amplitude ---
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak < self.amplitude_threshold {
            return Ok(None);
        }

        let mut magnitudes = self.analyzer.magnitudes(samples);

        let bin_width = sample_rate as f32 / samples.len() as f32;
        for (bin, magnitude) in magnitudes.iter_mut().enumerate() {
            if (bin as f32 * bin_width) < self.min_frequency {
                *magnitude = 0.0;
            }
        }

        // First bin wins on equal magnitude.
        let mut peak_bin = 0;
        let mut peak_magnitude = f32::NEG_INFINITY;
        for (bin, &magnitude) in magnitudes.iter().enumerate() {
            if magnitude > peak_magnitude {
                peak_bin = bin;
                peak_magnitude = magnitude;
            }
        }

        let frequency = (peak_bin as f32 * bin_width).abs();
        if frequency > 0.0 && peak_magnitude > 0.0 {
            log::trace!("Dominant bin {} ({:.2} Hz), peak amplitude {:.4}", peak_bin, frequency, peak);
            Ok(Some(frequency))
        } else {
            Ok(None)
        }
    }
}
