use super::estimator::YinEstimator;
use super::{MicPermission, PitchDetector, PitchEstimator, PitchReading, PitchReadings};
use crate::audio::capture;
use crate::error::AudioError;
use async_trait::async_trait;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use std::thread;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Captured frames buffered ahead of the estimator.
const FRAME_QUEUE: usize = 4;

/// Handle to a capture worker. Dropping it ends capture.
struct CaptureSession {
    shutdown_tx: Sender<()>,
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

/// Pitch detector reading the default cpal input device.
///
/// Capture and estimation run on a worker thread per session; readings reach
/// the caller through a tokio channel.
pub struct CpalPitchDetector {
    frame_size: usize,
    amplitude_threshold: f32,
    session: Mutex<Option<CaptureSession>>,
}

impl CpalPitchDetector {
    /// # Arguments
    /// * `frame_size` - Samples per analysis frame
    /// * `amplitude_threshold` - RMS below which a frame counts as silence
    pub fn new(frame_size: usize, amplitude_threshold: f32) -> Self {
        Self {
            frame_size,
            amplitude_threshold,
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PitchDetector for CpalPitchDetector {
    async fn request_permission(&self) -> MicPermission {
        match tokio::task::spawn_blocking(capture::has_input_device).await {
            Ok(true) => MicPermission::Authorized,
            Ok(false) => {
                log::warn!("No input device, microphone access denied");
                MicPermission::Denied
            }
            Err(e) => {
                log::warn!("Input device query failed: {}", e);
                MicPermission::NotDetermined
            }
        }
    }

    async fn start(&self) -> Result<PitchReadings, AudioError> {
        let mut session = self.session.lock().await;
        if session.take().is_some() {
            log::debug!("Replacing running capture session");
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (readings_tx, readings_rx) = mpsc::unbounded_channel();
        let frame_size = self.frame_size;
        let estimator = YinEstimator::new(self.amplitude_threshold, 440.0);

        thread::Builder::new()
            .name("pitch-capture".to_string())
            .spawn(move || run_capture(frame_size, estimator, ready_tx, shutdown_rx, readings_tx))
            .map_err(|e| AudioError::Other(e.into()))?;

        let sample_rate = match ready_rx.await {
            Ok(Ok(sample_rate)) => sample_rate,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(AudioError::WorkerGone),
        };
        log::info!("Pitch detection started at {} Hz", sample_rate);
        *session = Some(CaptureSession { shutdown_tx });
        Ok(readings_rx)
    }

    async fn stop(&self) {
        if self.session.lock().await.take().is_some() {
            log::info!("Pitch detection stopped");
        }
    }
}

fn run_capture<P: PitchEstimator>(
    frame_size: usize,
    mut estimator: P,
    ready_tx: oneshot::Sender<Result<u32, AudioError>>,
    shutdown_rx: Receiver<()>,
    readings_tx: mpsc::UnboundedSender<PitchReading>,
) {
    let (frames_tx, frames_rx) = crossbeam_channel::bounded::<Vec<f32>>(FRAME_QUEUE);
    let (errors_tx, errors_rx) = crossbeam_channel::bounded::<cpal::StreamError>(1);
    let (stream, sample_rate) = match capture::start_capture(frame_size, frames_tx, errors_tx) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::Other(e)));
            return;
        }
    };
    if ready_tx.send(Ok(sample_rate)).is_err() {
        return;
    }

    loop {
        crossbeam_channel::select! {
            recv(frames_rx) -> frame => {
                let Ok(frame) = frame else { break };
                let reading = estimator.estimate(&frame, sample_rate);
                if readings_tx.send(reading).is_err() {
                    break;
                }
            }
            // Explicit shutdown or a dropped session handle.
            recv(shutdown_rx) -> _ => break,
            // Dropping `readings_tx` below ends the reading stream.
            recv(errors_rx) -> err => {
                if let Ok(err) = err {
                    log::warn!("[pitch-capture] Capture failed: {}", err);
                }
                break;
            }
        }
    }

    if let Err(e) = stream.pause() {
        log::warn!("[pitch-capture] Error pausing stream: {}", e);
    }
    drop(stream);
    estimator.reset();
    log::info!("[pitch-capture] Input stream released");
}
