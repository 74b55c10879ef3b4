//! # Detector Configuration
//!
//! Tunable constants of the frequency estimator and note table. These are
//! plain values read at startup; nothing here changes while a run is active.

use serde::Deserialize;

/// Default number of samples per block.
///
/// At 44.1 kHz this gives a bin width of about 5.38 Hz, which is narrower
/// than the distance between neighbouring semitones above roughly 90 Hz.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Default capture rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default peak amplitude below which a block counts as silence.
///
/// Equivalent to 5000 on a signed 16-bit scale.
pub const DEFAULT_AMPLITUDE_THRESHOLD: f32 = 5000.0 / 32768.0;

/// Bins below this frequency are ignored when looking for the peak.
pub const DEFAULT_MIN_FREQUENCY: f32 = 20.0;

/// Reference pitch of A4 in Hz.
pub const DEFAULT_REFERENCE_PITCH: f32 = 440.0;

/// Configuration for frequency estimation and note naming.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// Samples per block handed to the estimator.
    pub block_size: usize,
    /// Requested capture rate in Hz.
    pub sample_rate: u32,
    /// Peak absolute amplitude (normalized, 0.0 to 1.0) required to analyse a block.
    pub amplitude_threshold: f32,
    /// Lowest frequency considered when picking the dominant bin.
    pub min_frequency: f32,
    /// Frequency of A4 used to build the note table.
    pub reference_pitch: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            amplitude_threshold: DEFAULT_AMPLITUDE_THRESHOLD,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            reference_pitch: DEFAULT_REFERENCE_PITCH,
        }
    }
}

impl DetectorConfig {
    /// Width of one FFT bin in Hz for the configured block size and rate.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.block_size as f32
    }
}
