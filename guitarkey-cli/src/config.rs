use anyhow::{Context, Result};
use guitarkey_core::{ActionMapping, DetectorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

/// Name of the configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "guitarkey.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub mapping: ActionMapping,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

/// Explicit `--config`, else `guitarkey.toml` in the working directory.
pub fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    })
}

/// Builds the effective configuration: file values, then command line flags.
///
/// The mapping starts from the built-in layout when `--default-mapping` is
/// given; file entries and `--map` flags are layered on top in that order.
pub fn resolve(cli: &Cli, file: Option<Config>) -> Config {
    let file = file.unwrap_or_default();
    let mut detector = file.detector;

    if let Some(block_size) = cli.block_size {
        detector.block_size = block_size;
    }
    if let Some(sample_rate) = cli.sample_rate {
        detector.sample_rate = sample_rate;
    }
    if let Some(threshold) = cli.threshold {
        detector.amplitude_threshold = threshold;
    }
    if let Some(min_frequency) = cli.min_frequency {
        detector.min_frequency = min_frequency;
    }
    if let Some(reference_pitch) = cli.reference_pitch {
        detector.reference_pitch = reference_pitch;
    }

    let mut mapping = if cli.default_mapping {
        ActionMapping::guitar_default()
    } else {
        ActionMapping::new()
    };
    for (note, action) in file.mapping.iter() {
        mapping.assign(note, action);
    }
    for (note, action) in &cli.mappings {
        mapping.assign(note, action);
    }

    Config { detector, mapping }
}

/// Rejects values the pipeline cannot run with.
pub fn validate(config: &DetectorConfig) -> Result<()> {
    if config.block_size < 2 {
        anyhow::bail!("block_size must be at least 2, got {}", config.block_size);
    }
    if config.sample_rate == 0 {
        anyhow::bail!("sample_rate must be positive");
    }
    if !(config.amplitude_threshold >= 0.0) {
        anyhow::bail!("amplitude_threshold must be non-negative");
    }
    if !(config.reference_pitch > 0.0) {
        anyhow::bail!("reference_pitch must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_full_file() {
        let config: Config = toml::from_str(
            r#"
            [detector]
            block_size = 4096
            amplitude_threshold = 0.05

            [mapping]
            A3 = "up"
            Db4 = "left"
            E4 = ""
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.block_size, 4096);
        assert_eq!(config.detector.sample_rate, 44100);
        assert_eq!(config.mapping.action_for("C#4"), Some("left"));
        assert_eq!(config.mapping.action_for("E4"), None);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("[detector]\nblocksize = 1").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let cli = Cli::parse_from([
            "guitarkey",
            "--default-mapping",
            "--map",
            "A3=jump",
            "--map",
            "B4=",
            "--sample-rate",
            "48000",
        ]);
        let file: Config = toml::from_str("[detector]\nsample_rate = 22050\n[mapping]\nG2 = \"q\"").unwrap();
        let config = resolve(&cli, Some(file));

        assert_eq!(config.detector.sample_rate, 48000);
        assert_eq!(config.mapping.action_for("A3"), Some("jump"));
        assert_eq!(config.mapping.action_for("B4"), None);
        assert_eq!(config.mapping.action_for("G2"), Some("q"));
        assert_eq!(config.mapping.action_for("C5"), Some("d"));
    }

    #[test]
    fn test_validate() {
        assert!(validate(&DetectorConfig::default()).is_ok());
        let bad = DetectorConfig {
            block_size: 0,
            ..DetectorConfig::default()
        };
        assert!(validate(&bad).is_err());
    }
}
