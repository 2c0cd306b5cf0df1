//! cpal output on a dedicated worker thread.

use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender};
use std::thread;
use tokio::sync::oneshot;

/// Mono frames rendered per inner loop of the callback.
const SCRATCH_FRAMES: usize = 1024;

/// Real-time mono signal generator driven by the output callback.
///
/// `render` runs on the audio thread and must not lock, allocate or block.
pub trait SampleSource: Send + 'static {
    fn render(&mut self, out: &mut [f32]);
}

/// Handle to a running output stream.
///
/// Dropping the handle signals the worker, which pauses and releases the
/// stream on its own thread. The worker also releases the stream, and with it
/// the source, after the first error the backend reports.
pub(crate) struct OutputWorker {
    shutdown_tx: Sender<()>,
    sample_rate: u32,
}

impl OutputWorker {
    /// Spawns a worker that opens the default output device and plays the
    /// source built by `factory`.
    ///
    /// # Arguments
    /// * `name` - Thread name, also used in log lines
    /// * `factory` - Builds the source once the device sample rate is known;
    ///   runs on the worker thread
    /// * `on_error` - Called with errors the backend reports after start; the
    ///   stream is released afterwards
    ///
    /// # Returns
    /// * `Ok(worker)` - Once the stream is playing
    /// * `Err(e)` - If the device, the source or the stream failed
    pub(crate) async fn spawn<S, F, E>(name: &str, factory: F, on_error: E) -> Result<Self, AudioError>
    where
        S: SampleSource,
        F: FnOnce(u32) -> Result<S, AudioError> + Send + 'static,
        E: FnMut(cpal::StreamError) + Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let thread_name = name.to_string();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(&thread_name, factory, on_error, ready_tx, shutdown_rx))
            .map_err(|e| AudioError::Other(e.into()))?;

        match ready_rx.await {
            Ok(Ok(sample_rate)) => Ok(Self {
                shutdown_tx,
                sample_rate,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AudioError::WorkerGone),
        }
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for OutputWorker {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

fn run_worker<S, F, E>(
    name: &str,
    factory: F,
    on_error: E,
    ready_tx: oneshot::Sender<Result<u32, AudioError>>,
    shutdown_rx: Receiver<()>,
) where
    S: SampleSource,
    F: FnOnce(u32) -> Result<S, AudioError>,
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let (failed_tx, failed_rx) = crossbeam_channel::bounded(1);
    let on_error = {
        let mut on_error = on_error;
        move |err: cpal::StreamError| {
            on_error(err);
            let _ = failed_tx.try_send(());
        }
    };
    let (stream, sample_rate) = match open_stream(factory, on_error) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    log::info!("[{}] Output stream playing at {} Hz", name, sample_rate);
    if ready_tx.send(Ok(sample_rate)).is_err() {
        // The caller gave up waiting.
        return;
    }

    crossbeam_channel::select! {
        // Explicit shutdown or a dropped handle.
        recv(shutdown_rx) -> _ => {}
        recv(failed_rx) -> _ => log::warn!("[{}] Output stream failed, releasing it", name),
    }

    if let Err(e) = stream.pause() {
        log::warn!("[{}] Error pausing stream: {}", name, e);
    }
    drop(stream);
    log::info!("[{}] Output stream released", name);
}

fn open_stream<S, F, E>(factory: F, on_error: E) -> Result<(cpal::Stream, u32), AudioError>
where
    S: SampleSource,
    F: FnOnce(u32) -> Result<S, AudioError>,
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;
    if let Ok(name) = device.name() {
        log::debug!("Using audio output device: {}", name);
    }

    let supported = device.default_output_config()?;
    let sample_rate = supported.sample_rate().0;
    let config = supported.config();
    let source = factory(sample_rate)?;

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_output_stream::<f32, S, E>(&device, &config, source, on_error)?,
        cpal::SampleFormat::I16 => build_output_stream::<i16, S, E>(&device, &config, source, on_error)?,
        cpal::SampleFormat::U16 => build_output_stream::<u16, S, E>(&device, &config, source, on_error)?,
        format => return Err(AudioError::UnsupportedFormat(format!("{:?}", format))),
    };
    stream.play()?;
    Ok((stream, sample_rate))
}

/// Builds a stream that renders `source` in mono and copies it to every
/// output channel.
fn build_output_stream<T, S, E>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut source: S,
    mut on_error: E,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
    S: SampleSource,
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let channels = (config.channels as usize).max(1);
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES];

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for block in data.chunks_mut(SCRATCH_FRAMES * channels) {
                let frames = block.len() / channels;
                let mono = &mut scratch[..frames];
                source.render(mono);
                for (frame, &value) in block.chunks_mut(channels).zip(mono.iter()) {
                    let sample = T::from_sample(value);
                    for slot in frame {
                        *slot = sample;
                    }
                }
            }
        },
        move |err| {
            log::error!("Output stream error: {}", err);
            on_error(err);
        },
        None,
    )
}
