//! # Audio Capture Module
//!
//! Real-time audio capture using CPAL (Cross-Platform Audio Library).
//! Captured audio is downmixed to mono, cut into fixed-size blocks and sent
//! to the pipeline over a channel. Stream errors travel on the same channel.
//!
//! ## Features
//! - Default input device with sample rate negotiation
//! - `f32` or `i16` input formats, any channel count
//! - Fixed-size block assembly independent of the driver's callback size

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::Sender;

use crate::error::CaptureError;
use crate::SampleBlock;

/// Message type of the capture channel.
pub type CaptureMessage = std::result::Result<SampleBlock, CaptureError>;

/// Cuts an interleaved sample stream into mono blocks of a fixed length.
#[derive(Debug)]
pub struct BlockAssembler {
    block_size: usize,
    channels: usize,
    sample_rate: u32,
    pending: Vec<f32>,
}

impl BlockAssembler {
    pub fn new(block_size: usize, channels: u16, sample_rate: u32) -> Self {
        Self {
            block_size,
            channels: channels.max(1) as usize,
            sample_rate,
            pending: Vec::with_capacity(block_size * 2),
        }
    }

    /// Appends interleaved samples and returns every block completed by them.
    ///
    /// Each frame is averaged across channels. A trailing partial frame is
    /// dropped, since drivers deliver whole frames.
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<SampleBlock> {
        if self.channels == 1 {
            self.pending.extend_from_slice(interleaved);
        } else {
            let scale = 1.0 / self.channels as f32;
            self.pending.extend(
                interleaved
                    .chunks_exact(self.channels)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        }

        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            let samples: Vec<f32> = self.pending.drain(..self.block_size).collect();
            blocks.push(SampleBlock::new(samples, self.sample_rate));
        }
        blocks
    }
}

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `block_size` - Samples per block sent to the pipeline
/// * `target_rate` - Desired sample rate in Hz; the closest supported rate is used
/// * `sender` - Channel for blocks and stream errors
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and the actual rate
/// * `Err(e)` - No device, no usable format, or the stream failed to start
///
/// The stream keeps running until the returned handle is dropped or paused.
pub fn start_capture(
    block_size: usize,
    target_rate: u32,
    sender: Sender<CaptureMessage>,
) -> Result<(cpal::Stream, u32)> {
    if block_size == 0 {
        return Err(anyhow!("Block size must be positive"));
    }

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No f32 or i16 input format found"))?;

    let config = if supported_config.min_sample_rate().0 <= target_rate
        && target_rate <= supported_config.max_sample_rate().0
    {
        supported_config.with_sample_rate(cpal::SampleRate(target_rate))
    } else {
        supported_config.with_max_sample_rate()
    };

    let sample_format = config.sample_format();
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();
    let config: cpal::StreamConfig = config.into();

    log::info!(
        "Selected {} Hz, {} channel(s), {:?}, blocks of {} samples",
        sample_rate,
        channels,
        sample_format,
        block_size
    );

    let error_sender = sender.clone();
    let err_fn = move |err: cpal::StreamError| {
        log::warn!("An error occurred on the audio stream: {}", err);
        let _ = error_sender.try_send(Err(CaptureError::Stream(err.to_string())));
    };

    let mut assembler = BlockAssembler::new(block_size, channels, sample_rate);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for block in assembler.push(data) {
                    // The receiver may already be gone during shutdown.
                    let _ = sender.try_send(Ok(block));
                }
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                for block in assembler.push(&converted) {
                    let _ = sender.try_send(Ok(block));
                }
            },
            err_fn,
            None,
        )?,
        other => return Err(anyhow!("Unsupported sample format {:?}", other)),
    };

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Picks the input configuration closest to what the pipeline wants.
///
/// Prefers `f32` over `i16`, then fewer channels, then the range closest to
/// `target_rate` (zero distance when the range contains it).
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| matches!(c.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .min_by_key(|c| {
            let format_rank = if c.sample_format() == SampleFormat::F32 { 0 } else { 1 };
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_distance = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            (format_rank, c.channels(), rate_distance)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_emits_fixed_blocks() {
        let mut assembler = BlockAssembler::new(4, 1, 8000);
        assert!(assembler.push(&[0.1, 0.2, 0.3]).is_empty());
        let blocks = assembler.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].samples(), &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(blocks[1].samples(), &[0.5, 0.6, 0.7, 0.8]);
        assert_eq!(blocks[1].sample_rate(), 8000);
        // 0.9 stays pending
        assert_eq!(assembler.push(&[1.0, 1.0, 1.0]).len(), 1);
    }

    #[test]
    fn test_assembler_downmixes_frames() {
        let mut assembler = BlockAssembler::new(2, 2, 44100);
        let blocks = assembler.push(&[1.0, 0.0, -0.5, -0.5]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].samples(), &[0.5, -0.5]);
    }
}
