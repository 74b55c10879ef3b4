//! # Pipeline Module
//!
//! Wires the frequency estimator, note classifier and key state machine into
//! a single owner that processes one block at a time.
//!
//! The pipeline is the only writer of the key state and the action mapping.
//! Other threads talk to it through channels: blocks come in from capture,
//! [`MappingEdit`]s from whatever edits the mapping, and a stop message ends
//! the run. Every step is reported to a [`StepObserver`] afterwards.

use crossbeam_channel::{never, select, Receiver, TryRecvError};
use serde::Serialize;

use crate::config::DetectorConfig;
use crate::error::{CaptureError, PipelineError};
use crate::keystate::{KeyEvent, KeyStateMachine};
use crate::mapping::{ActionMapping, MappingEdit};
use crate::pitch::FrequencyEstimator;
use crate::tuning::{canonical_note_name, NoteTable};
use crate::{Detection, SampleBlock};

/// Receives key events. This is where real key injection plugs in.
pub trait ActionSink {
    fn deliver(&mut self, event: &KeyEvent) -> anyhow::Result<()>;
}

/// Collects events in memory. Useful for tests and dry runs.
impl ActionSink for Vec<KeyEvent> {
    fn deliver(&mut self, event: &KeyEvent) -> anyhow::Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

/// Read-only view of the pipeline after each step.
pub trait StepObserver {
    fn on_step(&mut self, report: &StepReport);
}

impl<F: FnMut(&StepReport)> StepObserver for F {
    fn on_step(&mut self, report: &StepReport) {
        self(report)
    }
}

/// Snapshot of one processed block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// The classified note, or `None` for no signal.
    pub detection: Option<Detection>,
    /// Events emitted by this step, in delivery order.
    pub events: Vec<KeyEvent>,
    /// The active action after this step.
    pub active: Option<String>,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop signal was raised.
    Stopped,
    /// The capture side closed its channel.
    CaptureEnded,
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub blocks: u64,
    pub activations: u64,
    pub reason: StopReason,
}

/// Channels through which other threads steer a run.
#[derive(Debug, Clone)]
pub struct Controls {
    /// A message, or dropping every sender, stops the run.
    pub stop: Receiver<()>,
    /// Mapping edits applied between blocks.
    pub edits: Receiver<MappingEdit>,
}

impl Controls {
    /// Controls with a stop channel and no edit source.
    pub fn with_stop(stop: Receiver<()>) -> Self {
        Self { stop, edits: never() }
    }
}

// Outcome of one wait in the run loop.
enum Next {
    Stop,
    Edit(Option<MappingEdit>),
    Block(Option<Result<SampleBlock, CaptureError>>),
}

/// The pitch-to-key pipeline.
#[derive(Debug)]
pub struct Pipeline {
    estimator: FrequencyEstimator,
    table: NoteTable,
    mapping: ActionMapping,
    keys: KeyStateMachine,
}

impl Pipeline {
    pub fn new(estimator: FrequencyEstimator, table: NoteTable, mapping: ActionMapping) -> Self {
        Self {
            estimator,
            table,
            mapping,
            keys: KeyStateMachine::new(),
        }
    }

    /// Builds a pipeline whose note table covers `mapping`.
    pub fn from_config(config: &DetectorConfig, mapping: ActionMapping) -> Self {
        let table = NoteTable::covering(&mapping, config.reference_pitch);
        log::info!(
            "Note table has {} notes ({} mapped)",
            table.len(),
            mapping.len()
        );
        Self::new(FrequencyEstimator::from_config(config), table, mapping)
    }

    pub fn table(&self) -> &NoteTable {
        &self.table
    }

    pub fn mapping(&self) -> &ActionMapping {
        &self.mapping
    }

    pub fn active(&self) -> Option<&str> {
        self.keys.active()
    }

    /// Applies a mapping edit.
    ///
    /// Assignments and replacement mappings must only name notes in the
    /// table. Anything else is rejected with [`PipelineError::UnknownNote`]
    /// and leaves the mapping untouched.
    pub fn apply_edit(&mut self, edit: MappingEdit) -> Result<(), PipelineError> {
        match edit {
            MappingEdit::Assign { note, action } => {
                let canonical = canonical_note_name(&note).unwrap_or_else(|| note.trim().to_string());
                if !self.table.contains(&canonical) {
                    return Err(PipelineError::UnknownNote(canonical));
                }
                log::debug!("Mapping {} -> {:?}", canonical, action);
                self.mapping.assign(&canonical, &action);
            }
            MappingEdit::Clear { note } => {
                log::debug!("Clearing mapping for {}", note);
                self.mapping.clear(&note);
            }
            MappingEdit::Replace(mapping) => {
                if let Some((note, _)) = mapping.iter().find(|(note, _)| !self.table.contains(note)) {
                    return Err(PipelineError::UnknownNote(note.to_string()));
                }
                log::debug!("Replacing mapping ({} entries)", mapping.len());
                self.mapping = mapping;
            }
        }
        Ok(())
    }

    /// Runs one block through estimate, classify and step, then delivers the
    /// resulting events in order.
    ///
    /// The key state is updated before anything is delivered. If the sink
    /// fails, the error is returned and the remaining events of this step are
    /// not attempted.
    pub fn process_block<S: ActionSink>(
        &mut self,
        block: &SampleBlock,
        sink: &mut S,
    ) -> Result<StepReport, PipelineError> {
        let frequency = self.estimator.estimate(block)?;
        let detection = self.table.classify(frequency);
        let events = self.keys.step(detection.as_ref(), &self.mapping).to_events();

        if let Some(d) = &detection {
            log::debug!(
                "{} at {:.2} Hz (error {:+.2} Hz)",
                d.note_name,
                d.frequency,
                d.error_hz
            );
        }
        for event in &events {
            log::info!("{}", event);
            sink.deliver(event)
                .map_err(|e| PipelineError::delivery(event.clone(), e))?;
        }

        Ok(StepReport {
            detection,
            events,
            active: self.keys.active().map(str::to_string),
        })
    }

    /// Releases the active action, if any, through `sink`.
    ///
    /// Returns the delivered event. Calling it again is a no-op.
    pub fn release<S: ActionSink>(&mut self, sink: &mut S) -> Result<Option<KeyEvent>, PipelineError> {
        match self.keys.release() {
            Some(event) => {
                log::info!("{} (release)", event);
                sink.deliver(&event)
                    .map_err(|e| PipelineError::delivery(event.clone(), e))?;
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    /// Processes blocks until stopped.
    ///
    /// Ends when the stop channel fires (or all its senders are gone) or when
    /// the block channel closes. Either way any active action is released
    /// before returning. A capture error also releases first and is then
    /// returned. A pending stop always wins over queued blocks, and pending
    /// mapping edits are applied before the next block.
    pub fn run<S, O>(
        &mut self,
        blocks: &Receiver<Result<SampleBlock, CaptureError>>,
        controls: &Controls,
        sink: &mut S,
        observer: &mut O,
    ) -> Result<RunSummary, PipelineError>
    where
        S: ActionSink,
        O: StepObserver,
    {
        let mut edits = controls.edits.clone();
        let mut blocks_seen = 0u64;
        let mut activations = 0u64;

        log::info!("Entering processing loop...");
        let reason = loop {
            match controls.stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break StopReason::Stopped,
                Err(TryRecvError::Empty) => {}
            }
            loop {
                match edits.try_recv() {
                    Ok(edit) => self.apply_edit_logged(edit),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::debug!("Mapping edit channel closed");
                        edits = never();
                        break;
                    }
                }
            }

            let next = select! {
                recv(controls.stop) -> _ => Next::Stop,
                recv(edits) -> msg => Next::Edit(msg.ok()),
                recv(blocks) -> msg => Next::Block(msg.ok()),
            };

            match next {
                Next::Stop => break StopReason::Stopped,
                Next::Edit(Some(edit)) => self.apply_edit_logged(edit),
                Next::Edit(None) => {
                    log::debug!("Mapping edit channel closed");
                    edits = never();
                }
                Next::Block(Some(Ok(block))) => {
                    blocks_seen += 1;
                    let report = match self.process_block(&block, sink) {
                        Ok(report) => report,
                        Err(e) => {
                            self.release_quietly(sink);
                            return Err(e);
                        }
                    };
                    activations += report
                        .events
                        .iter()
                        .filter(|e| matches!(e, KeyEvent::Activate(_)))
                        .count() as u64;
                    observer.on_step(&report);
                }
                Next::Block(Some(Err(capture_error))) => {
                    log::error!("Capture failed: {}", capture_error);
                    self.release_quietly(sink);
                    return Err(capture_error.into());
                }
                Next::Block(None) => break StopReason::CaptureEnded,
            }
        };

        log::info!("Leaving processing loop ({:?})", reason);
        self.release(sink)?;

        Ok(RunSummary {
            blocks: blocks_seen,
            activations,
            reason,
        })
    }

    fn apply_edit_logged(&mut self, edit: MappingEdit) {
        if let Err(e) = self.apply_edit(edit) {
            log::warn!("Ignoring mapping edit: {}", e);
        }
    }

    // Error paths: the first error is the one reported.
    fn release_quietly<S: ActionSink>(&mut self, sink: &mut S) {
        if let Err(e) = self.release(sink) {
            log::error!("Release after failure also failed: {}", e);
        }
    }
}
