//! # Audio Capture
//!
//! Microphone input through cpal, cut into fixed-size mono frames for the
//! pitch estimator.
//!
//! ## Features
//! - Default input device with a preference for mono `f32` near 44.1 kHz
//! - Multi-channel input mixed down to mono
//! - Frames handed off with a non-blocking `try_send`; a slow consumer drops
//!   frames instead of stalling the callback

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::Sender;

/// Preferred capture rate.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Whether the platform exposes a default input device.
pub fn has_input_device() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// Starts capture from the default input device.
///
/// The stream must stay on the calling thread; dropping it ends capture.
///
/// # Arguments
/// * `frame_size` - Samples per frame sent to `sender`
/// * `sender` - Receives each complete mono frame
/// * `errors` - Receives errors the backend reports after start
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Playing stream and its sample rate
/// * `Err(e)` - No device, no usable format, or the stream failed to start
pub fn start_capture(
    frame_size: usize,
    sender: Sender<Vec<f32>>,
    errors: Sender<cpal::StreamError>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;
    log::info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable input format found"))?;
    let sample_rate = TARGET_SAMPLE_RATE.clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(sample_rate)).into();
    log::info!(
        "Capturing {} channel(s) of {:?} at {} Hz, {} samples per frame",
        config.channels,
        format,
        sample_rate,
        frame_size
    );

    let stream = match format {
        SampleFormat::F32 => build_input_stream::<f32>(&device, &config, frame_size, sender, errors)?,
        SampleFormat::I16 => build_input_stream::<i16>(&device, &config, frame_size, sender, errors)?,
        SampleFormat::U16 => build_input_stream::<u16>(&device, &config, frame_size, sender, errors)?,
        other => return Err(anyhow!("Unsupported input format {:?}", other)),
    };
    stream.play()?;

    Ok((stream, sample_rate))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    frame_size: usize,
    sender: Sender<Vec<f32>>,
    errors: Sender<cpal::StreamError>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = (config.channels as usize).max(1);
    let frame_size = frame_size.max(1);
    // Accumulates mono samples until a full frame is available.
    let mut audio_buffer: Vec<f32> = Vec::with_capacity(frame_size * 2);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            audio_buffer.extend(data.chunks(channels).map(|frame| {
                frame.iter().map(|&s| <f32 as Sample>::from_sample(s)).sum::<f32>() / frame.len() as f32
            }));

            while audio_buffer.len() >= frame_size {
                let frame = audio_buffer[..frame_size].to_vec();
                // Full channel: the estimator is behind, drop the frame.
                let _ = sender.try_send(frame);
                audio_buffer.drain(..frame_size);
            }
        },
        move |err| {
            log::error!("Input stream error: {}", err);
            let _ = errors.try_send(err);
        },
        None,
    )?;
    Ok(stream)
}

/// Picks the input configuration closest to `target_rate`, preferring `f32`
/// and then fewer channels.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| matches!(c.sample_format(), SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16))
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = c.min_sample_rate().0.abs_diff(target_rate);
                let max_diff = c.max_sample_rate().0.abs_diff(target_rate);
                min_diff.min(max_diff)
            };
            (c.sample_format() != SampleFormat::F32, rate_distance, c.channels())
        })
}
