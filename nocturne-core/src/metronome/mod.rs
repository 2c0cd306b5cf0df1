//! # Metronome Module
//!
//! The metronome feature: state, actions, the reducer and the effects it
//! schedules.
//!
//! ## Features
//! - BPM from steppers, dial drag, tap tempo or numeric entry, always clamped to 30–240
//! - Time signatures with selectable accent patterns
//! - Ten click timbres, switchable while playing
//! - Debounced persistence of tempo, time signature and timbre

pub mod effects;
mod model;
mod reducer;
mod state;

pub use effects::MetronomeEffects;
pub use model::{AccentPattern, BeatSound, TimeSignature};
pub use reducer::MetronomeReducer;
pub use state::{
    clamp_bpm, MetronomeAction, MetronomeState, Tick, BPM_MAX, BPM_MIN, TAP_HISTORY, TAP_RESET_SECS,
};

/// Store owning the metronome state.
pub type MetronomeStore = crate::store::Store<MetronomeReducer>;
