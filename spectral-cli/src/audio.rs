//! # Audio Capture Module
//!
//! Captures the default input device with CPAL and forwards fixed-size
//! blocks of mono samples to the analysis loop.
//!
//! Blocks are sent with `try_send` over a bounded channel: when the analysis
//! loop falls behind, new blocks are dropped instead of queueing up.

use anyhow::{Context, Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{info, warn};

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel sender for blocks of `block_size` mono samples
/// * `target_rate` - Preferred sample rate in Hz
/// * `block_size` - Number of samples per forwarded block
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and the rate actually used
/// * `Err(e)` - Error if no device or no usable f32 format is available
pub fn start_audio_capture(
    sender: Sender<Vec<f32>>,
    target_rate: u32,
    block_size: usize,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    let device_name = device.name()?;
    info!(device = %device_name, "using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    info!(sample_rate, channels, "selected input format");

    let err_fn = |err| warn!("an error occurred on the audio stream: {}", err);

    // Accumulates mono samples until a full block is available.
    let mut audio_buffer: Vec<f32> = Vec::with_capacity(block_size * 2);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Downmix interleaved frames to mono.
                audio_buffer.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                );

                while audio_buffer.len() >= block_size {
                    let block = audio_buffer[..block_size].to_vec();
                    // A full channel means the consumer is behind; drop the block.
                    let _ = sender.try_send(block);
                    audio_buffer.drain(..block_size);
                }
            },
            err_fn,
            None,
        )
        .context("building input stream")?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Picks the f32 configuration whose rate range is closest to `target_rate`,
/// preferring mono.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (rate_distance, c.channels())
        })
}
