//! Console side of the pipeline: where key events and note changes end up.

use std::io::Write;

use guitarkey_core::{ActionSink, KeyEvent, StepObserver, StepReport};

/// Writes key events to a stream, one per line.
///
/// Stands in for real key injection: whatever reads this output decides
/// what a key down means.
pub struct ConsoleSink<W: Write> {
    out: W,
    json: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }
}

impl<W: Write> ActionSink for ConsoleSink<W> {
    fn deliver(&mut self, event: &KeyEvent) -> anyhow::Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, event)?;
            writeln!(self.out)?;
        } else {
            match event {
                KeyEvent::Activate(action) => writeln!(self.out, "key down: {}", action)?,
                KeyEvent::Deactivate(action) => writeln!(self.out, "key up: {}", action)?,
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Logs the detected note whenever it changes.
#[derive(Debug, Default)]
pub struct NoteDisplay {
    last_note: Option<String>,
}

impl StepObserver for NoteDisplay {
    fn on_step(&mut self, report: &StepReport) {
        let note = report.detection.as_ref().map(|d| d.note_name.as_str());
        if note == self.last_note.as_deref() {
            return;
        }
        match &report.detection {
            Some(d) => log::info!(
                "Note {} ({:.2} Hz, {:+.2} Hz / {:+.1} cents), active: {}",
                d.note_name,
                d.frequency,
                d.error_hz,
                d.cents_deviation,
                report.active.as_deref().unwrap_or("none")
            ),
            None => log::info!("No note detected"),
        }
        self.last_note = note.map(str::to_string);
    }
}
