//! Effect builders for the tuner reducer.

use super::state::TunerAction;
use crate::audio::{ToneEvent, TonePlayer};
use crate::effect::{Effect, EffectId};
use crate::pitch::{DisplayFeed, PitchDetector};
use crate::settings::{SettingsStore, TunerSettings};
use std::sync::Arc;
use std::time::Duration;

/// Pitch reading stream. Stop is registered here too.
pub const PITCH: EffectId = EffectId::Named("tuner.pitch");
/// Reference tone lifecycle stream. Stop is registered here too.
pub const TONE: EffectId = EffectId::Named("tuner.tone");
pub const PERSIST: EffectId = EffectId::Named("tuner.persist");

pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

/// Capability handles used by the tuner reducer.
#[derive(Clone)]
pub struct TunerEffects {
    detector: Arc<dyn PitchDetector>,
    tone: Arc<dyn TonePlayer>,
    settings: Arc<dyn SettingsStore>,
    display: Option<DisplayFeed>,
    debounce: Duration,
}

impl TunerEffects {
    pub fn new(
        detector: Arc<dyn PitchDetector>,
        tone: Arc<dyn TonePlayer>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            detector,
            tone,
            settings,
            display: None,
            debounce: PERSIST_DEBOUNCE,
        }
    }

    /// Mirrors every raw reading into the 60 Hz display smoother.
    pub fn with_display(mut self, display: DisplayFeed) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn request_mic_permission(&self) -> Effect<TunerAction> {
        let detector = Arc::clone(&self.detector);
        Effect::run(move || async move {
            let status = detector.request_permission().await;
            Some(TunerAction::MicPermissionUpdated(status))
        })
    }

    /// Starts capture and republishes readings as `PitchDetected` (positive
    /// frequency) or `PitchLost`.
    ///
    /// A reading stream that ends while this effect is still registered means
    /// capture failed; it is reported as `MicListenFailed`.
    pub fn start_pitch_detection(&self) -> Effect<TunerAction> {
        let detector = Arc::clone(&self.detector);
        let display = self.display.clone();
        Effect::stream(PITCH, move |send| async move {
            let mut readings = match detector.start().await {
                Ok(readings) => readings,
                Err(e) => {
                    log::warn!("Pitch detection failed to start: {}", e);
                    send.send(TunerAction::MicListenFailed);
                    return;
                }
            };
            if let Some(display) = &display {
                display.start();
            }
            while let Some(reading) = readings.recv().await {
                if let Some(display) = &display {
                    display.push(&reading);
                }
                let action = if reading.is_pitched() {
                    TunerAction::PitchDetected(reading)
                } else {
                    TunerAction::PitchLost
                };
                if !send.send(action) {
                    return;
                }
            }
            log::warn!("Pitch reading stream ended unexpectedly");
            if send.send(TunerAction::MicListenFailed) {
                if let Some(display) = &display {
                    display.stop();
                }
            }
        })
    }

    pub fn stop_pitch_detection(&self) -> Effect<TunerAction> {
        let detector = Arc::clone(&self.detector);
        let display = self.display.clone();
        Effect::merge([
            Effect::Cancel(PITCH),
            Effect::fire_and_forget_with_id(PITCH, move || async move {
                if let Some(display) = display {
                    display.stop();
                }
                detector.stop().await;
            }),
        ])
    }

    /// Plays a reference tone and forwards its lifecycle events.
    pub fn play_tone(&self, frequency: f64) -> Effect<TunerAction> {
        let tone = Arc::clone(&self.tone);
        Effect::stream(TONE, move |send| async move {
            let mut events = match tone.play(frequency).await {
                Ok(events) => events,
                Err(e) => {
                    log::warn!("Reference tone failed to start: {}", e);
                    send.send(TunerAction::TonePlaybackFailed);
                    return;
                }
            };
            send.send(TunerAction::ToneStarted);
            while let Some(event) = events.recv().await {
                let action = match event {
                    ToneEvent::Started => continue,
                    ToneEvent::Stopped => TunerAction::ToneStopped,
                    ToneEvent::Failed => TunerAction::TonePlaybackFailed,
                };
                if !send.send(action) {
                    break;
                }
            }
        })
    }

    pub fn stop_tone(&self) -> Effect<TunerAction> {
        let tone = Arc::clone(&self.tone);
        Effect::merge([
            Effect::Cancel(TONE),
            Effect::fire_and_forget_with_id(TONE, move || async move { tone.stop().await }),
        ])
    }

    pub fn debounced_persist(&self) -> Effect<TunerAction> {
        let debounce = self.debounce;
        Effect::merge([
            Effect::Cancel(PERSIST),
            Effect::run_with_id(PERSIST, move || async move {
                tokio::time::sleep(debounce).await;
                Some(TunerAction::PersistRequested)
            }),
        ])
    }

    pub fn persist(&self, settings: TunerSettings) -> Effect<TunerAction> {
        let store = Arc::clone(&self.settings);
        Effect::fire_and_forget(move || async move {
            match tokio::task::spawn_blocking(move || store.save_tuner(&settings)).await {
                Ok(Ok(())) => log::debug!("Saved tuner settings {:?}", settings),
                Ok(Err(e)) => log::warn!("Failed to save tuner settings: {}", e),
                Err(e) => log::warn!("Tuner settings save task failed: {}", e),
            }
        })
    }

    pub fn load_settings(&self) -> Effect<TunerAction> {
        let store = Arc::clone(&self.settings);
        Effect::run(move || async move {
            match tokio::task::spawn_blocking(move || store.load_tuner()).await {
                Ok(settings) => Some(TunerAction::SettingsLoaded(settings)),
                Err(e) => {
                    log::warn!("Tuner settings load task failed: {}", e);
                    None
                }
            }
        })
    }
}
