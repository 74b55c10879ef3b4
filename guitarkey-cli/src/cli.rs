use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "guitarkey", about = "Play notes on an instrument, press keys on the computer")]
pub struct Cli {
    /// Configuration file (TOML). Defaults to ./guitarkey.toml when present
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Map a note to an action, e.g. --map A3=up (repeatable)
    #[arg(short, long = "map", value_name = "NOTE=ACTION", value_parser = parse_assignment)]
    pub mappings: Vec<(String, String)>,

    /// Start from the built-in guitar layout instead of an empty mapping
    #[arg(long)]
    pub default_mapping: bool,

    /// Samples per analysis block
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Requested capture rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Peak amplitude (0.0-1.0) below which a block counts as silence
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Ignore spectral content below this frequency (Hz)
    #[arg(long)]
    pub min_frequency: Option<f32>,

    /// Frequency of A4 in Hz
    #[arg(long)]
    pub reference_pitch: Option<f32>,

    /// Print key events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Stop after this many seconds instead of waiting for Enter
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Print the note table and mapping, then exit
    #[arg(long)]
    pub list_notes: bool,
}

/// Parses `NOTE=ACTION`. An empty action is allowed and clears the note.
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (note, action) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NOTE=ACTION, got {:?}", s))?;
    let note = note.trim();
    if note.is_empty() {
        return Err(format!("missing note name in {:?}", s));
    }
    Ok((note.to_string(), action.trim().to_string()))
}
