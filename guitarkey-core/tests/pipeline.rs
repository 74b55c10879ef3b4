//! Integration tests for the pitch-to-key pipeline

use crossbeam_channel::{bounded, unbounded, Sender};
use guitarkey_core::{
    ActionMapping, CaptureError, Controls, DetectorConfig, KeyEvent, MappingEdit, NoteTable,
    Pipeline, PipelineError, SampleBlock, StepReport, StopReason,
};

const SAMPLE_RATE: u32 = 44100;
const BLOCK_SIZE: usize = 8192;

/// Generate one block of a pure sine at `frequency`.
fn sine_block(frequency: f32) -> SampleBlock {
    let samples = (0..BLOCK_SIZE)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.6 * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect();
    SampleBlock::new(samples, SAMPLE_RATE)
}

fn quiet_block() -> SampleBlock {
    let samples = (0..BLOCK_SIZE)
        .map(|i| 0.01 * (i as f32 * 0.3).sin())
        .collect();
    SampleBlock::new(samples, SAMPLE_RATE)
}

fn mapping() -> ActionMapping {
    // A4 and A3 map to different actions, E4 is explicitly empty.
    [("A4", "a"), ("A3", "b"), ("E4", "")].into_iter().collect()
}

fn feed(tx: &Sender<Result<SampleBlock, CaptureError>>, blocks: Vec<SampleBlock>) {
    for block in blocks {
        tx.send(Ok(block)).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_tones_classify_to_expected_notes() {
        let config = DetectorConfig::default();
        let mut pipeline = Pipeline::from_config(&config, ActionMapping::new());
        let mut sink = Vec::new();

        let a4 = pipeline.process_block(&sine_block(440.0), &mut sink).unwrap();
        let detection = a4.detection.expect("440 Hz should be detected");
        assert_eq!(detection.note_name, "A4");
        assert!((detection.reference_frequency - 440.0).abs() < 1e-3);
        assert!(detection.error_hz.abs() < config.bin_width());

        let a3 = pipeline.process_block(&sine_block(220.0), &mut sink).unwrap();
        assert_eq!(a3.detection.unwrap().note_name, "A3");

        // Nothing is mapped, so nothing was delivered.
        assert!(sink.is_empty());
    }

    #[test]
    fn test_run_until_capture_ends() {
        let (tx, rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded(1);
        feed(
            &tx,
            vec![
                sine_block(440.0),
                sine_block(440.0),
                sine_block(440.0),
                sine_block(220.0),
                sine_block(329.63), // E4, empty entry
                quiet_block(),
                sine_block(220.0),
            ],
        );
        drop(tx);

        let mut pipeline = Pipeline::from_config(&DetectorConfig::default(), mapping());
        let mut sink = Vec::new();
        let mut reports: Vec<StepReport> = Vec::new();
        let summary = pipeline
            .run(&rx, &Controls::with_stop(stop_rx), &mut sink, &mut |r: &StepReport| {
                reports.push(r.clone())
            })
            .unwrap();

        assert_eq!(summary.reason, StopReason::CaptureEnded);
        assert_eq!(summary.blocks, 7);
        assert_eq!(summary.activations, 3);
        assert_eq!(
            sink,
            vec![
                KeyEvent::Activate("a".into()),
                KeyEvent::Deactivate("a".into()),
                KeyEvent::Activate("b".into()),
                KeyEvent::Deactivate("b".into()),
                KeyEvent::Activate("b".into()),
                // released when capture ended
                KeyEvent::Deactivate("b".into()),
            ]
        );
        assert_eq!(reports.len(), 7);
        assert!(reports[5].detection.is_none());
        assert_eq!(reports[6].active.as_deref(), Some("b"));
        assert_eq!(pipeline.active(), None);
    }

    #[test]
    fn test_stop_while_active_releases_exactly_once() {
        let (tx, rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);
        feed(&tx, vec![sine_block(440.0), sine_block(440.0), sine_block(440.0)]);
        feed(&tx, vec![sine_block(220.0); 5]);

        let mut pipeline = Pipeline::from_config(&DetectorConfig::default(), mapping());
        let mut sink = Vec::new();
        let mut steps = 0;
        let summary = pipeline
            .run(&rx, &Controls::with_stop(stop_rx), &mut sink, &mut |_: &StepReport| {
                steps += 1;
                if steps == 2 {
                    stop_tx.send(()).unwrap();
                }
            })
            .unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(summary.blocks, 2);
        assert_eq!(
            sink,
            vec![KeyEvent::Activate("a".into()), KeyEvent::Deactivate("a".into())]
        );
        // Blocks after the stop are left unprocessed.
        assert_eq!(rx.len(), 6);
    }

    #[test]
    fn test_stop_while_idle_emits_nothing() {
        let (tx, rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);
        feed(&tx, vec![quiet_block(), quiet_block()]);
        stop_tx.send(()).unwrap();

        let mut pipeline = Pipeline::from_config(&DetectorConfig::default(), mapping());
        let mut sink = Vec::new();
        let summary = pipeline
            .run(&rx, &Controls::with_stop(stop_rx), &mut sink, &mut |_: &StepReport| {})
            .unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(summary.blocks, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_dropped_stop_sender_counts_as_stop() {
        let (tx, rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        feed(&tx, vec![sine_block(440.0)]);

        let mut pipeline = Pipeline::from_config(&DetectorConfig::default(), mapping());
        let mut sink = Vec::new();
        let mut stop_tx = Some(stop_tx);
        let summary = pipeline
            .run(&rx, &Controls::with_stop(stop_rx), &mut sink, &mut |_: &StepReport| {
                stop_tx.take();
            })
            .unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(
            sink,
            vec![KeyEvent::Activate("a".into()), KeyEvent::Deactivate("a".into())]
        );
    }

    #[test]
    fn test_capture_error_releases_then_surfaces() {
        let (tx, rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded::<()>(1);
        feed(&tx, vec![sine_block(220.0)]);
        tx.send(Err(CaptureError::Stream("device lost".into()))).unwrap();

        let mut pipeline = Pipeline::from_config(&DetectorConfig::default(), mapping());
        let mut sink = Vec::new();
        let err = pipeline
            .run(&rx, &Controls::with_stop(stop_rx), &mut sink, &mut |_: &StepReport| {})
            .unwrap_err();

        assert!(matches!(err, PipelineError::Capture(CaptureError::Stream(_))));
        assert_eq!(
            sink,
            vec![KeyEvent::Activate("b".into()), KeyEvent::Deactivate("b".into())]
        );
    }

    #[test]
    fn test_mapping_edits_apply_between_blocks() {
        let (tx, rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded::<()>(1);
        let (edit_tx, edit_rx) = unbounded();
        feed(&tx, vec![sine_block(440.0), sine_block(440.0), sine_block(440.0)]);
        drop(tx);

        let controls = Controls {
            stop: stop_rx,
            edits: edit_rx,
        };
        let mut pipeline = Pipeline::from_config(&DetectorConfig::default(), mapping());
        let mut sink = Vec::new();
        let mut steps = 0;
        pipeline
            .run(&rx, &controls, &mut sink, &mut |_: &StepReport| {
                steps += 1;
                match steps {
                    1 => {
                        // Unknown notes are ignored, the valid remap applies.
                        edit_tx
                            .send(MappingEdit::Assign { note: "C12".into(), action: "q".into() })
                            .unwrap();
                        edit_tx
                            .send(MappingEdit::Assign { note: "A4".into(), action: "z".into() })
                            .unwrap();
                    }
                    2 => edit_tx.send(MappingEdit::Clear { note: "A4".into() }).unwrap(),
                    _ => {}
                }
            })
            .unwrap();

        assert_eq!(
            sink,
            vec![
                KeyEvent::Activate("a".into()),
                KeyEvent::Deactivate("a".into()),
                KeyEvent::Activate("z".into()),
                KeyEvent::Deactivate("z".into()),
            ]
        );
        assert_eq!(pipeline.mapping().action_for("A4"), None);
    }

    #[test]
    fn test_empty_mapping_never_emits() {
        let (tx, rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded::<()>(1);
        feed(&tx, vec![sine_block(440.0), sine_block(220.0), quiet_block()]);
        drop(tx);

        let config = DetectorConfig::default();
        let table = NoteTable::covering(&ActionMapping::new(), config.reference_pitch);
        let mut pipeline = Pipeline::new(
            guitarkey_core::FrequencyEstimator::from_config(&config),
            table,
            ActionMapping::new(),
        );
        let mut sink = Vec::new();
        let summary = pipeline
            .run(&rx, &Controls::with_stop(stop_rx), &mut sink, &mut |_: &StepReport| {})
            .unwrap();

        assert_eq!(summary.blocks, 3);
        assert_eq!(summary.activations, 0);
        assert!(sink.is_empty());
    }
}
