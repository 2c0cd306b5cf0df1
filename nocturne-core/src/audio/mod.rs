//! # Audio Module
//!
//! Audio engines driven by the reducers' effects, and the real-time render
//! code behind them.
//!
//! ## Features
//! - [`MetronomeEngine`] and [`TonePlayer`] capability traits
//! - Sample-accurate beat scheduling with lock-free parameter updates
//! - Click timbres from WAV files or synthesized on the fly
//! - Sine reference tone with a 10 ms fade in and out
//! - cpal output on a dedicated worker thread per session
//!
//! ## Threading
//! A `cpal::Stream` cannot leave the thread that built it, so every session
//! owns a worker thread that builds the stream, reports readiness and then
//! parks until shutdown. The render callback never locks, allocates or
//! blocks: it reads parameters through an `ArcSwap` snapshot and hands ticks
//! off with a non-blocking `try_send`.

pub mod capture;
mod metronome_engine;
mod output;
pub mod samples;
pub mod scheduler;
pub mod tone;

use crate::error::AudioError;
use crate::metronome::{BeatSound, Tick};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use metronome_engine::CpalMetronomeEngine;
pub use output::SampleSource;
pub use tone::CpalTonePlayer;

/// Ticks of one engine session, in the order they were rendered. Ends when
/// the session stops.
pub type TickStream = mpsc::UnboundedReceiver<Tick>;

/// Lifecycle events of one reference tone.
pub type ToneEvents = mpsc::UnboundedReceiver<ToneEvent>;

/// Everything the scheduler needs to start a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickConfig {
    pub bpm: u32,
    pub beats_per_measure: u32,
    pub accent_pattern: Vec<bool>,
    pub beat_sound: BeatSound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneEvent {
    Started,
    Stopped,
    Failed,
}

/// Click generator used by the metronome.
///
/// Starting while a session is running replaces that session.
#[async_trait]
pub trait MetronomeEngine: Send + Sync {
    async fn start(&self, config: ClickConfig) -> Result<TickStream, AudioError>;
    async fn stop(&self);
    async fn update_tempo(&self, bpm: u32);
    async fn update_accent_pattern(&self, pattern: Vec<bool>);
    async fn update_beat_sound(&self, sound: BeatSound) -> Result<(), AudioError>;
}

/// Reference tone generator used by the tuner.
///
/// Playing while a tone is sounding replaces that tone.
#[async_trait]
pub trait TonePlayer: Send + Sync {
    async fn play(&self, frequency: f64) -> Result<ToneEvents, AudioError>;
    async fn stop(&self);
}

/// Samples per beat at `bpm`.
pub fn samples_per_beat(sample_rate: u32, bpm: u32) -> f64 {
    sample_rate as f64 * 60.0 / bpm.max(1) as f64
}
