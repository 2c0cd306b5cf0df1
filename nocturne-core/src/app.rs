//! # App Coordinator
//!
//! Owns the metronome and tuner stores, wires their collaborators and routes
//! application lifecycle events to both features.

use crate::audio::{samples::SampleLibrary, CpalMetronomeEngine, CpalTonePlayer, MetronomeEngine, TonePlayer};
use crate::config::Config;
use crate::metronome::{MetronomeAction, MetronomeEffects, MetronomeReducer, MetronomeState, MetronomeStore};
use crate::pitch::{CpalPitchDetector, DisplayFeed, PitchDetector};
use crate::settings::{JsonSettingsStore, SettingsStore};
use crate::store::Store;
use crate::tuner::{TunerAction, TunerEffects, TunerReducer, TunerState, TunerStore};
use std::sync::Arc;
use std::time::Duration;

/// Application lifecycle transitions reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    DidBecomeActive,
    WillResignActive,
    DidEnterBackground,
}

/// The capabilities both features are built on.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn MetronomeEngine>,
    pub tone: Arc<dyn TonePlayer>,
    pub detector: Arc<dyn PitchDetector>,
    pub settings: Arc<dyn SettingsStore>,
}

impl Collaborators {
    /// cpal engines and the JSON settings file named by `config`.
    pub fn live(config: &Config) -> Self {
        let library = match &config.samples_dir {
            Some(dir) => SampleLibrary::from_dir(dir),
            None => SampleLibrary::synthesized(),
        };
        Self {
            engine: Arc::new(CpalMetronomeEngine::new(library)),
            tone: Arc::new(CpalTonePlayer::new()),
            detector: Arc::new(CpalPitchDetector::new(config.input_frame_size, config.amplitude_threshold)),
            settings: Arc::new(JsonSettingsStore::new(config.settings_path())),
        }
    }

    /// Replaces the settings collaborator.
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = settings;
        self
    }
}

pub struct App {
    metronome: MetronomeStore,
    tuner: TunerStore,
}

impl App {
    /// Builds both stores on the current tokio runtime.
    ///
    /// # Arguments
    /// * `collaborators` - Engines and settings shared by the features
    /// * `display` - Receives every raw pitch reading for display smoothing
    /// * `debounce` - Quiet period before edited settings are saved
    pub fn new(collaborators: Collaborators, display: Option<DisplayFeed>, debounce: Duration) -> Self {
        let Collaborators {
            engine,
            tone,
            detector,
            settings,
        } = collaborators;

        let metronome_effects = MetronomeEffects::new(engine, Arc::clone(&settings)).with_debounce(debounce);
        let mut tuner_effects = TunerEffects::new(detector, tone, settings).with_debounce(debounce);
        if let Some(display) = display {
            tuner_effects = tuner_effects.with_display(display);
        }

        Self {
            metronome: Store::new(MetronomeState::default(), MetronomeReducer::new(metronome_effects)),
            tuner: Store::new(TunerState::default(), TunerReducer::new(tuner_effects)),
        }
    }

    /// Loads persisted settings into both features.
    pub fn start(&self) {
        log::info!("Loading settings");
        self.metronome.send(MetronomeAction::LoadSettings);
        self.tuner.send(TunerAction::LoadSettings);
    }

    /// Silences both features when the app leaves the foreground.
    pub fn lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::WillResignActive | LifecycleEvent::DidEnterBackground => {
                log::debug!("Lifecycle {:?}: stopping audio", event);
                self.metronome.send(MetronomeAction::AppBecameInactive);
                self.tuner.send(TunerAction::StopAll);
            }
            LifecycleEvent::DidBecomeActive => {}
        }
    }

    pub fn metronome(&self) -> &MetronomeStore {
        &self.metronome
    }

    pub fn tuner(&self) -> &TunerStore {
        &self.tuner
    }
}
