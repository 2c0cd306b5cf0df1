//! Recording collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use nocturne_core::audio::{ClickConfig, MetronomeEngine, TickStream, ToneEvent, ToneEvents, TonePlayer};
use nocturne_core::metronome::{BeatSound, MetronomeEffects, MetronomeReducer, MetronomeState, Tick};
use nocturne_core::pitch::{MicPermission, PitchDetector, PitchReading, PitchReadings};
use nocturne_core::settings::{MetronomeSettings, SettingsStore, TunerSettings};
use nocturne_core::tuner::{TunerEffects, TunerReducer, TunerState};
use nocturne_core::{AudioError, SettingsError, Store};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Lets every ready task run, then advances the paused clock by 1 ms.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Settles until `condition` holds, giving blocking-pool work real time to
/// finish. Gives up after a bounded number of rounds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
        settle().await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Start(ClickConfig),
    Stop,
    Tempo(u32),
    Accent(Vec<bool>),
    Sound(BeatSound),
}

#[derive(Default)]
pub struct MockEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub sessions: Mutex<Vec<mpsc::UnboundedSender<Tick>>>,
    pub fail_start: AtomicBool,
}

impl MockEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn starts(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, EngineCall::Start(_))).count()
    }

    /// Emits a tick on the most recent session.
    pub fn tick(&self, beat: u32) -> bool {
        match self.sessions.lock().last() {
            Some(session) => session.send(Tick { beat, is_accent: beat == 0 }).is_ok(),
            None => false,
        }
    }

    /// Ends every open tick stream, as a failed output device would.
    pub fn end_sessions(&self) {
        self.sessions.lock().clear();
    }
}

#[async_trait]
impl MetronomeEngine for MockEngine {
    async fn start(&self, config: ClickConfig) -> Result<TickStream, AudioError> {
        self.calls.lock().push(EngineCall::Start(config));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(AudioError::NoOutputDevice);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().push(tx);
        Ok(rx)
    }

    async fn stop(&self) {
        self.calls.lock().push(EngineCall::Stop);
    }

    async fn update_tempo(&self, bpm: u32) {
        self.calls.lock().push(EngineCall::Tempo(bpm));
    }

    async fn update_accent_pattern(&self, pattern: Vec<bool>) {
        self.calls.lock().push(EngineCall::Accent(pattern));
    }

    async fn update_beat_sound(&self, sound: BeatSound) -> Result<(), AudioError> {
        self.calls.lock().push(EngineCall::Sound(sound));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToneCall {
    Play(f64),
    Stop,
}

#[derive(Default)]
pub struct MockTone {
    pub calls: Mutex<Vec<ToneCall>>,
    pub sessions: Mutex<Vec<mpsc::UnboundedSender<ToneEvent>>>,
    pub fail_play: AtomicBool,
}

impl MockTone {
    pub fn calls(&self) -> Vec<ToneCall> {
        self.calls.lock().clone()
    }

    pub fn emit(&self, event: ToneEvent) -> bool {
        match self.sessions.lock().last() {
            Some(session) => session.send(event).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl TonePlayer for MockTone {
    async fn play(&self, frequency: f64) -> Result<ToneEvents, AudioError> {
        self.calls.lock().push(ToneCall::Play(frequency));
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(AudioError::NoOutputDevice);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ToneEvent::Started);
        self.sessions.lock().push(tx);
        Ok(rx)
    }

    async fn stop(&self) {
        self.calls.lock().push(ToneCall::Stop);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorCall {
    RequestPermission,
    Start,
    Stop,
}

pub struct MockDetector {
    pub permission: Mutex<MicPermission>,
    pub calls: Mutex<Vec<DetectorCall>>,
    pub sessions: Mutex<Vec<mpsc::UnboundedSender<PitchReading>>>,
    pub fail_start: AtomicBool,
}

impl MockDetector {
    pub fn new(permission: MicPermission) -> Self {
        Self {
            permission: Mutex::new(permission),
            calls: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            fail_start: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<DetectorCall> {
        self.calls.lock().clone()
    }

    pub fn emit(&self, reading: PitchReading) -> bool {
        match self.sessions.lock().last() {
            Some(session) => session.send(reading).is_ok(),
            None => false,
        }
    }

    /// Ends every open reading stream, as a lost input device would.
    pub fn end_sessions(&self) {
        self.sessions.lock().clear();
    }
}

#[async_trait]
impl PitchDetector for MockDetector {
    async fn request_permission(&self) -> MicPermission {
        self.calls.lock().push(DetectorCall::RequestPermission);
        *self.permission.lock()
    }

    async fn start(&self) -> Result<PitchReadings, AudioError> {
        self.calls.lock().push(DetectorCall::Start);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(AudioError::NoInputDevice);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().push(tx);
        Ok(rx)
    }

    async fn stop(&self) {
        self.calls.lock().push(DetectorCall::Stop);
    }
}

/// Settings store that serves fixed values and records every save.
#[derive(Default)]
pub struct RecordingSettings {
    pub metronome: MetronomeSettings,
    pub tuner: TunerSettings,
    pub metronome_saves: Mutex<Vec<MetronomeSettings>>,
    pub tuner_saves: Mutex<Vec<TunerSettings>>,
}

impl RecordingSettings {
    pub fn metronome_saves(&self) -> Vec<MetronomeSettings> {
        self.metronome_saves.lock().clone()
    }

    pub fn tuner_saves(&self) -> Vec<TunerSettings> {
        self.tuner_saves.lock().clone()
    }
}

impl SettingsStore for RecordingSettings {
    fn load_metronome(&self) -> MetronomeSettings {
        self.metronome
    }

    fn save_metronome(&self, settings: &MetronomeSettings) -> Result<(), SettingsError> {
        self.metronome_saves.lock().push(*settings);
        Ok(())
    }

    fn load_tuner(&self) -> TunerSettings {
        self.tuner
    }

    fn save_tuner(&self, settings: &TunerSettings) -> Result<(), SettingsError> {
        self.tuner_saves.lock().push(*settings);
        Ok(())
    }
}

pub struct MetronomeHarness {
    pub store: Store<MetronomeReducer>,
    pub engine: Arc<MockEngine>,
    pub settings: Arc<RecordingSettings>,
}

pub fn metronome() -> MetronomeHarness {
    metronome_with(RecordingSettings::default())
}

pub fn metronome_with(settings: RecordingSettings) -> MetronomeHarness {
    let engine = Arc::new(MockEngine::default());
    let settings = Arc::new(settings);
    let effects = MetronomeEffects::new(engine.clone(), settings.clone());
    MetronomeHarness {
        store: Store::new(MetronomeState::default(), MetronomeReducer::new(effects)),
        engine,
        settings,
    }
}

pub struct TunerHarness {
    pub store: Store<TunerReducer>,
    pub detector: Arc<MockDetector>,
    pub tone: Arc<MockTone>,
    pub settings: Arc<RecordingSettings>,
}

pub fn tuner(permission: MicPermission) -> TunerHarness {
    tuner_with(permission, RecordingSettings::default())
}

pub fn tuner_with(permission: MicPermission, settings: RecordingSettings) -> TunerHarness {
    let detector = Arc::new(MockDetector::new(permission));
    let tone = Arc::new(MockTone::default());
    let settings = Arc::new(settings);
    let effects = TunerEffects::new(detector.clone(), tone.clone(), settings.clone());
    TunerHarness {
        store: Store::new(TunerState::default(), TunerReducer::new(effects)),
        detector,
        tone,
        settings,
    }
}
