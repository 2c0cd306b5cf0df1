//! Effect builders for the metronome reducer.
//!
//! The reducer never calls the engine or the settings store directly; it asks
//! [`MetronomeEffects`] for an [`Effect`] that will do so once the store
//! interprets it.

use super::state::MetronomeAction;
use crate::audio::{ClickConfig, MetronomeEngine};
use crate::effect::{Effect, EffectId};
use crate::metronome::BeatSound;
use crate::settings::{MetronomeSettings, SettingsStore};
use std::sync::Arc;
use std::time::Duration;

/// Tick stream of the running engine. Stop is registered here too, so a
/// later start supersedes a stop that has not run yet.
pub const ENGINE: EffectId = EffectId::Named("metronome.engine");
pub const PERSIST: EffectId = EffectId::Named("metronome.persist");
pub const TEMPO: EffectId = EffectId::Named("metronome.tempo");
pub const ACCENT: EffectId = EffectId::Named("metronome.accent");
pub const SOUND: EffectId = EffectId::Named("metronome.sound");

/// Quiet period before a burst of edits is saved.
pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

/// Capability handles used by the metronome reducer.
#[derive(Clone)]
pub struct MetronomeEffects {
    engine: Arc<dyn MetronomeEngine>,
    settings: Arc<dyn SettingsStore>,
    debounce: Duration,
}

impl MetronomeEffects {
    pub fn new(engine: Arc<dyn MetronomeEngine>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            engine,
            settings,
            debounce: PERSIST_DEBOUNCE,
        }
    }

    /// Overrides the persistence debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Starts the engine and forwards its ticks until the session ends.
    ///
    /// A start failure, or a tick stream that ends while this effect is still
    /// registered, is reported once as `EngineStartFailed`. Stopping or
    /// restarting cancels the effect first, so neither reaches that path.
    pub fn start_engine(&self, config: ClickConfig) -> Effect<MetronomeAction> {
        let engine = Arc::clone(&self.engine);
        Effect::stream(ENGINE, move |send| async move {
            match engine.start(config).await {
                Ok(mut ticks) => {
                    while let Some(tick) = ticks.recv().await {
                        if !send.send(MetronomeAction::EngineTick { beat: tick.beat }) {
                            return;
                        }
                    }
                    log::warn!("Metronome output ended unexpectedly");
                    send.send(MetronomeAction::EngineStartFailed);
                }
                Err(e) => {
                    log::warn!("Metronome engine failed to start: {}", e);
                    send.send(MetronomeAction::EngineStartFailed);
                }
            }
        })
    }

    pub fn stop_engine(&self) -> Effect<MetronomeAction> {
        let engine = Arc::clone(&self.engine);
        Effect::merge([
            Effect::Cancel(ENGINE),
            Effect::fire_and_forget_with_id(ENGINE, move || async move { engine.stop().await }),
        ])
    }

    pub fn update_tempo(&self, bpm: u32) -> Effect<MetronomeAction> {
        let engine = Arc::clone(&self.engine);
        Effect::fire_and_forget_with_id(TEMPO, move || async move { engine.update_tempo(bpm).await })
    }

    pub fn update_accent_pattern(&self, pattern: Vec<bool>) -> Effect<MetronomeAction> {
        let engine = Arc::clone(&self.engine);
        Effect::fire_and_forget_with_id(ACCENT, move || async move {
            engine.update_accent_pattern(pattern).await
        })
    }

    pub fn update_beat_sound(&self, sound: BeatSound) -> Effect<MetronomeAction> {
        let engine = Arc::clone(&self.engine);
        Effect::fire_and_forget_with_id(SOUND, move || async move {
            if let Err(e) = engine.update_beat_sound(sound).await {
                log::warn!("Keeping previous click sound, {} failed to load: {}", sound.key(), e);
            }
        })
    }

    /// Emits `PersistRequested` after the debounce window unless another edit
    /// restarts the timer first.
    pub fn debounced_persist(&self) -> Effect<MetronomeAction> {
        let debounce = self.debounce;
        Effect::merge([
            Effect::Cancel(PERSIST),
            Effect::run_with_id(PERSIST, move || async move {
                tokio::time::sleep(debounce).await;
                Some(MetronomeAction::PersistRequested)
            }),
        ])
    }

    pub fn persist(&self, settings: MetronomeSettings) -> Effect<MetronomeAction> {
        let store = Arc::clone(&self.settings);
        Effect::fire_and_forget(move || async move {
            let saved = tokio::task::spawn_blocking(move || store.save_metronome(&settings)).await;
            match saved {
                Ok(Ok(())) => log::debug!("Saved metronome settings {:?}", settings),
                Ok(Err(e)) => log::warn!("Failed to save metronome settings: {}", e),
                Err(e) => log::warn!("Metronome settings save task failed: {}", e),
            }
        })
    }

    pub fn load_settings(&self) -> Effect<MetronomeAction> {
        let store = Arc::clone(&self.settings);
        Effect::run(move || async move {
            match tokio::task::spawn_blocking(move || store.load_metronome()).await {
                Ok(settings) => Some(MetronomeAction::SettingsLoaded(settings)),
                Err(e) => {
                    log::warn!("Metronome settings load task failed: {}", e);
                    None
                }
            }
        })
    }
}
