//! # Tuner Module
//!
//! The tuner feature in its two modes: listening through the microphone and
//! playing reference tones for the strings of a chosen tuning.
//!
//! ## Features
//! - Microphone permission flow and pitch detection lifecycle
//! - Note/octave derivation for incoming readings, tolerant of short dropouts
//! - Guitar, bass and ukulele tunings with toggleable reference tones
//! - A4 calibration (430–450 Hz) with debounced persistence

pub mod effects;
mod reducer;
mod state;
pub mod tuning;

pub use effects::TunerEffects;
pub use reducer::TunerReducer;
pub use state::{clamp_a4, DetectedPitch, TunerAction, TunerMode, TunerState, A4_MAX, A4_MIN};
pub use tuning::{Instrument, NoteName, TuningDatabase, TuningPreset, TuningString};

/// Store owning the tuner state.
pub type TunerStore = crate::store::Store<TunerReducer>;
