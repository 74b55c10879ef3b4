//! Error types for the pitch-to-key pipeline.
//!
//! Only genuinely invalid input and collaborator failures are errors here.
//! A silent block or an unmapped note is a normal outcome and never shows up
//! as a [`PipelineError`].

use thiserror::Error;

use crate::keystate::KeyEvent;

/// Errors reported by the capture side of the pipeline.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The audio backend reported a stream error.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// The capture side could not produce a block in the expected format.
    #[error("malformed capture data: {0}")]
    Format(String),
}

/// Errors that can occur while driving the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty or malformed sample block, or a non-positive sample rate.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A mapping edit named a note that is not part of the note table.
    #[error("note {0:?} is not in the note table")]
    UnknownNote(String),

    /// The capture collaborator failed.
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// The action sink failed to deliver an event.
    ///
    /// The key state has already been updated when this is returned.
    #[error("failed to deliver {event}: {source}")]
    Delivery {
        event: KeyEvent,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl PipelineError {
    /// Builds a [`PipelineError::Delivery`] from a sink error.
    pub fn delivery(event: KeyEvent, source: anyhow::Error) -> Self {
        PipelineError::Delivery {
            event,
            source: source.into(),
        }
    }
}
