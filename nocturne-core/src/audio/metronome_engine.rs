use super::output::OutputWorker;
use super::samples::SampleLibrary;
use super::scheduler::{BeatScheduler, ClickParams, SchedulerHandle};
use super::{samples_per_beat, ClickConfig, MetronomeEngine, TickStream};
use crate::error::AudioError;
use crate::metronome::{BeatSound, Tick};
use async_trait::async_trait;
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, Mutex};

/// Ticks buffered between the render callback and the forwarder thread.
const TICK_QUEUE: usize = 64;

struct Session {
    // Dropping the worker silences and releases the output stream.
    _output: OutputWorker,
    scheduler: SchedulerHandle,
}

/// Metronome engine playing through the default cpal output device.
pub struct CpalMetronomeEngine {
    library: SampleLibrary,
    session: Mutex<Option<Session>>,
}

impl CpalMetronomeEngine {
    pub fn new(library: SampleLibrary) -> Self {
        Self {
            library,
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MetronomeEngine for CpalMetronomeEngine {
    async fn start(&self, config: ClickConfig) -> Result<TickStream, AudioError> {
        let mut session = self.session.lock().await;
        if session.take().is_some() {
            log::debug!("Replacing running metronome session");
        }

        let (tick_tx, tick_rx) = crossbeam_channel::bounded::<Tick>(TICK_QUEUE);
        let (handle_tx, handle_rx) = crossbeam_channel::bounded::<SchedulerHandle>(1);
        let library = self.library.clone();
        let ClickConfig {
            bpm,
            beats_per_measure,
            accent_pattern,
            beat_sound,
        } = config;

        let output = OutputWorker::spawn(
            "metronome-output",
            move |sample_rate| {
                let params = ClickParams {
                    samples_per_beat: samples_per_beat(sample_rate, bpm),
                    accent_pattern,
                    samples: Arc::new(library.load(beat_sound, sample_rate)?),
                };
                let (scheduler, handle) = BeatScheduler::new(sample_rate, params, beats_per_measure, tick_tx);
                handle_tx.send(handle).map_err(|_| AudioError::WorkerGone)?;
                Ok(scheduler)
            },
            // The worker releases a failed stream, which ends the tick stream.
            |_| {},
        )
        .await?;
        let scheduler = handle_rx.try_recv().map_err(|_| AudioError::WorkerGone)?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("metronome-ticks".to_string())
            .spawn(move || {
                // Ends once the render callback, and with it the last sender, is dropped.
                for tick in tick_rx.iter() {
                    if out_tx.send(tick).is_err() {
                        break;
                    }
                }
                log::debug!("Tick forwarder finished");
            })
            .map_err(|e| AudioError::Other(e.into()))?;

        log::info!(
            "Metronome started: {} BPM, {} beats, {} at {} Hz",
            bpm,
            beats_per_measure,
            beat_sound.key(),
            scheduler.sample_rate()
        );
        *session = Some(Session {
            _output: output,
            scheduler,
        });
        Ok(out_rx)
    }

    async fn stop(&self) {
        if self.session.lock().await.take().is_some() {
            log::info!("Metronome stopped");
        }
    }

    async fn update_tempo(&self, bpm: u32) {
        if let Some(session) = self.session.lock().await.as_ref() {
            session.scheduler.set_tempo(bpm);
            log::debug!("Tempo -> {} BPM", bpm);
        }
    }

    async fn update_accent_pattern(&self, pattern: Vec<bool>) {
        if let Some(session) = self.session.lock().await.as_ref() {
            session.scheduler.set_accent_pattern(pattern);
        }
    }

    async fn update_beat_sound(&self, sound: BeatSound) -> Result<(), AudioError> {
        let session = self.session.lock().await;
        let Some(session) = session.as_ref() else {
            return Ok(());
        };
        let library = self.library.clone();
        let sample_rate = session.scheduler.sample_rate();
        let samples = tokio::task::spawn_blocking(move || library.load(sound, sample_rate))
            .await
            .map_err(|e| AudioError::Other(e.into()))??;
        session.scheduler.set_samples(Arc::new(samples));
        log::debug!("Click sound -> {}", sound.key());
        Ok(())
    }
}
