// guitarkey-core/src/lib.rs

//! The core logic for turning a monophonic instrument into a keyboard.
//! This crate estimates the dominant pitch of each captured block, names the
//! nearest note and turns sustained notes into key down / key up events.
//! It is completely headless; delivering the events is up to the caller.

use serde::Serialize;

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod keystate;
pub mod mapping;
pub mod pipeline;
pub mod pitch;
pub mod tuning;

pub use config::DetectorConfig;
pub use error::{CaptureError, PipelineError};
pub use keystate::{KeyEvent, KeyStateMachine, StepEvents};
pub use mapping::{ActionMapping, MappingEdit};
pub use pipeline::{ActionSink, Controls, Pipeline, RunSummary, StepObserver, StepReport, StopReason};
pub use pitch::FrequencyEstimator;
pub use tuning::NoteTable;

/// One fixed-length block of mono samples.
///
/// Samples are normalized to roughly -1.0..=1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBlock {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Represents the classification of a single block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// The name of the nearest note.
    pub note_name: String,
    /// The estimated dominant frequency in Hz.
    pub frequency: f32,
    /// The table frequency of the nearest note in Hz.
    pub reference_frequency: f32,
    /// Measured minus reference, in Hz.
    pub error_hz: f32,
    /// The same deviation in cents.
    pub cents_deviation: f32,
}
