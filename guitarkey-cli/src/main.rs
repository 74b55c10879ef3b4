//! # guitarkey - play notes, press keys
//!
//! Command line front end for `guitarkey-core`.
//!
//! ## Architecture
//! - **Main Thread**: configuration, stop signal sources, waits for the run
//! - **Audio Thread**: owns the capture stream and the pipeline
//! - **Communication**: crossbeam channels for blocks and the stop signal

mod cli;
mod config;
mod output;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use std::io::BufRead;
use std::thread;
use std::time::Duration;

use cli::Cli;
use config::Config;
use guitarkey_core::{audio, Controls, NoteTable, Pipeline, RunSummary};
use output::{ConsoleSink, NoteDisplay};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let file = match config::config_path(&cli) {
        Some(path) => {
            let loaded = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            Some(loaded)
        }
        None => None,
    };
    let config = config::resolve(&cli, file);
    config::validate(&config.detector)?;

    if cli.list_notes {
        print_notes(&config);
        return Ok(());
    }

    if config.mapping.is_empty() {
        log::warn!("No notes are mapped; nothing will be pressed (see --map or --default-mapping)");
    }

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    match cli.duration {
        Some(seconds) => spawn_timer(stop_tx, seconds)?,
        None => spawn_stdin_watcher(stop_tx),
    }

    let json = cli.json;
    let audio_thread = thread::Builder::new()
        .name("audio".into())
        .spawn(move || run_audio(config, stop_rx, json))
        .context("Failed to spawn audio thread")?;

    let summary = audio_thread
        .join()
        .map_err(|_| anyhow!("Audio thread panicked"))??;

    log::info!(
        "Processed {} blocks, {} key presses ({:?})",
        summary.blocks,
        summary.activations,
        summary.reason
    );
    Ok(())
}

/// Starts capture and drives the pipeline until stopped.
///
/// The stream is created here because it has to stay on the thread that
/// owns it.
fn run_audio(config: Config, stop_rx: Receiver<()>, json: bool) -> Result<RunSummary> {
    let detector = config.detector;
    let mut pipeline = Pipeline::from_config(&detector, config.mapping);

    let (block_tx, block_rx) = crossbeam_channel::unbounded();
    let (stream, sample_rate) = audio::start_capture(detector.block_size, detector.sample_rate, block_tx)
        .context("Failed to start audio capture")?;
    if sample_rate != detector.sample_rate {
        log::warn!(
            "Device runs at {} Hz instead of {} Hz; bin width is {:.2} Hz",
            sample_rate,
            detector.sample_rate,
            sample_rate as f32 / detector.block_size as f32
        );
    }

    log::info!("Listening... play a note.");

    let mut sink = ConsoleSink::new(std::io::stdout(), json);
    let mut display = NoteDisplay::default();
    let result = pipeline.run(&block_rx, &Controls::with_stop(stop_rx), &mut sink, &mut display);

    log::info!("Stopping stream...");
    if let Err(e) = stream.pause() {
        log::warn!("Error pausing stream: {}", e);
    }
    drop(stream);

    Ok(result?)
}

fn spawn_stdin_watcher(stop_tx: Sender<()>) {
    thread::spawn(move || {
        let mut line = String::new();
        // Enter, end of input and read errors all mean stop.
        let _ = std::io::stdin().lock().read_line(&mut line);
        log::info!("Stop requested");
        let _ = stop_tx.try_send(());
    });
}

fn spawn_timer(stop_tx: Sender<()>, seconds: f64) -> Result<()> {
    let duration = Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("Invalid duration {}", seconds))?;
    thread::spawn(move || {
        thread::sleep(duration);
        log::info!("Duration elapsed");
        let _ = stop_tx.try_send(());
    });
    Ok(())
}

fn print_notes(config: &Config) {
    let table = NoteTable::covering(&config.mapping, config.detector.reference_pitch);
    println!("{:<6} {:>10}  action", "note", "Hz");
    for note in table.iter() {
        let action = config.mapping.action_for(&note.name).unwrap_or("");
        println!("{:<6} {:>10.2}  {}", note.name, note.frequency, action);
    }
}
