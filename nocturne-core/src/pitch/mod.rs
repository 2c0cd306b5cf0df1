//! # Pitch Module
//!
//! Pitch capture and display smoothing for the tuner.
//!
//! ## Features
//! - [`PitchDetector`] capability: microphone permission, reading stream, stop
//! - [`PitchEstimator`] seam for the per-frame pitch algorithm, with a YIN
//!   implementation refined by an FFT peak search
//! - cpal microphone capture feeding the estimator on a worker thread
//! - 60 Hz display smoothing with note hysteresis, fed alongside the store

mod detector;
pub mod display;
pub mod estimator;

use crate::error::AudioError;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use detector::CpalPitchDetector;
pub use display::{DisplayFeed, DisplayValues, PitchDisplayEngine};
pub use estimator::YinEstimator;

/// Microphone access as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MicPermission {
    #[default]
    NotDetermined,
    Authorized,
    Denied,
}

/// One raw estimator result.
///
/// `hz < 0` or `midi == -1` means no pitch was detected in the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchReading {
    pub hz: f64,
    pub midi: i32,
    /// Offset from `midi` in cents, -50 to +50.
    pub cents: f64,
    /// 0.0 to 1.0.
    pub confidence: f64,
    /// 0.0 to 1.0.
    pub stability: f64,
}

impl PitchReading {
    pub const NONE: PitchReading = PitchReading {
        hz: -1.0,
        midi: -1,
        cents: 0.0,
        confidence: 0.0,
        stability: 0.0,
    };

    pub fn is_pitched(&self) -> bool {
        self.hz > 0.0 && self.midi >= 0
    }
}

/// Readings of one capture session in frame order. Ends when capture stops.
pub type PitchReadings = mpsc::UnboundedReceiver<PitchReading>;

/// Microphone pitch detection used by the tuner.
///
/// Starting while a session is running replaces that session.
#[async_trait]
pub trait PitchDetector: Send + Sync {
    async fn request_permission(&self) -> MicPermission;
    async fn start(&self) -> Result<PitchReadings, AudioError>;
    async fn stop(&self);
}

/// Per-frame pitch algorithm. Consumed as an opaque capability by the
/// detector.
pub trait PitchEstimator: Send {
    /// Analyzes one frame of mono samples.
    fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchReading;

    /// Forgets any state carried between frames.
    fn reset(&mut self) {}
}
