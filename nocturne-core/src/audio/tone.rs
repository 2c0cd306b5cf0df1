//! Reference tone playback for the tuner.

use super::output::{OutputWorker, SampleSource};
use super::{ToneEvent, ToneEvents, TonePlayer};
use crate::error::AudioError;
use async_trait::async_trait;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Length of the fade in and fade out ramps.
pub const FADE: Duration = Duration::from_millis(10);

const AMPLITUDE: f32 = 0.8;

/// How long `stop` waits for the fade out before releasing the stream.
const RELEASE_DELAY: Duration = Duration::from_millis(30);

/// Sine oscillator with linear fade ramps.
///
/// The oscillator fades in while `running` is set and fades out to silence
/// once it is cleared.
pub struct ToneOscillator {
    phase: f64,
    phase_increment: f64,
    amplitude: f32,
    fade_increment: f32,
    running: Arc<AtomicBool>,
}

impl ToneOscillator {
    pub fn new(frequency: f64, sample_rate: u32, running: Arc<AtomicBool>) -> Self {
        let rate = sample_rate.max(1) as f64;
        Self {
            phase: 0.0,
            phase_increment: TAU * frequency / rate,
            amplitude: 0.0,
            fade_increment: (1.0 / (rate * FADE.as_secs_f64())) as f32,
            running,
        }
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }
}

impl SampleSource for ToneOscillator {
    fn render(&mut self, out: &mut [f32]) {
        let running = self.running.load(Ordering::Acquire);
        for sample in out.iter_mut() {
            self.amplitude = if running {
                (self.amplitude + self.fade_increment).min(AMPLITUDE)
            } else {
                (self.amplitude - self.fade_increment).max(0.0)
            };
            *sample = self.phase.sin() as f32 * self.amplitude;
            self.phase += self.phase_increment;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
    }
}

struct ToneSession {
    output: OutputWorker,
    running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ToneEvent>,
}

impl ToneSession {
    /// Fades out, then releases the stream and closes the event channel.
    async fn stop(self) {
        self.running.store(false, Ordering::Release);
        tokio::time::sleep(RELEASE_DELAY).await;
        let _ = self.events.send(ToneEvent::Stopped);
        drop(self.output);
    }
}

/// Tone player using the default cpal output device.
#[derive(Default)]
pub struct CpalTonePlayer {
    session: Mutex<Option<ToneSession>>,
}

impl CpalTonePlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TonePlayer for CpalTonePlayer {
    async fn play(&self, frequency: f64) -> Result<ToneEvents, AudioError> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            previous.stop().await;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let oscillator_running = Arc::clone(&running);
        let failures = events_tx.clone();

        let output = OutputWorker::spawn(
            "tone-output",
            move |sample_rate| Ok(ToneOscillator::new(frequency, sample_rate, oscillator_running)),
            move |_| {
                let _ = failures.send(ToneEvent::Failed);
            },
        )
        .await?;

        log::info!("Reference tone {:.2} Hz at {} Hz", frequency, output.sample_rate());
        let _ = events_tx.send(ToneEvent::Started);
        *session = Some(ToneSession {
            output,
            running,
            events: events_tx,
        });
        Ok(events_rx)
    }

    async fn stop(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.stop().await;
            log::info!("Reference tone stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fades_in_over_ten_milliseconds_and_out_again() {
        let running = Arc::new(AtomicBool::new(true));
        let mut oscillator = ToneOscillator::new(440.0, 1000, Arc::clone(&running));

        let mut out = vec![0.0; 5];
        oscillator.render(&mut out);
        assert_relative_eq!(oscillator.amplitude(), 0.5, epsilon = 1e-6);

        let mut out = vec![0.0; 100];
        oscillator.render(&mut out);
        assert_relative_eq!(oscillator.amplitude(), AMPLITUDE);

        running.store(false, Ordering::Release);
        let mut out = vec![0.0; 10];
        oscillator.render(&mut out);
        assert_eq!(oscillator.amplitude(), 0.0);
        assert_eq!(out[9], 0.0);
    }

    #[test]
    fn output_is_a_sine_at_the_requested_frequency() {
        let running = Arc::new(AtomicBool::new(true));
        let mut oscillator = ToneOscillator::new(100.0, 8000, running);
        let mut out = vec![0.0; 8000];
        oscillator.render(&mut out);

        // After the fade in, a 100 Hz sine crosses zero upwards 100 times a second.
        let upward = out[100..]
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        assert!((98..=100).contains(&upward), "{} crossings", upward);
        assert!(out.iter().all(|s| s.abs() <= AMPLITUDE + 1e-6));
    }
}
