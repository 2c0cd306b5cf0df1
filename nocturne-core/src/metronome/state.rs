use super::model::{AccentPattern, BeatSound, TimeSignature};
use crate::settings::MetronomeSettings;
use std::time::Instant;

pub const BPM_MIN: u32 = 30;
pub const BPM_MAX: u32 = 240;

/// Maximum number of tap timestamps kept for tap tempo.
pub const TAP_HISTORY: usize = 8;
/// A tap arriving later than this after the previous one starts a new run.
pub const TAP_RESET_SECS: f64 = 2.0;

/// Clamps any integer BPM input into `[BPM_MIN, BPM_MAX]`.
pub fn clamp_bpm(bpm: i64) -> u32 {
    bpm.clamp(BPM_MIN as i64, BPM_MAX as i64) as u32
}

/// One beat boundary reported by the audio scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub beat: u32,
    pub is_accent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetronomeState {
    pub bpm: u32,
    pub time_signature: TimeSignature,
    pub is_playing: bool,
    pub current_beat: u32,
    pub tap_timestamps: Vec<Instant>,
    pub dial_angle: f64,
    pub is_dragging: bool,
    pub show_time_signature_picker: bool,
    pub accent_pattern_index: usize,
    pub beat_sound: BeatSound,
    pub show_bpm_entry: bool,
}

impl Default for MetronomeState {
    fn default() -> Self {
        Self {
            bpm: 120,
            time_signature: TimeSignature::FOUR_FOUR,
            is_playing: false,
            current_beat: 0,
            tap_timestamps: Vec::new(),
            dial_angle: 0.0,
            is_dragging: false,
            show_time_signature_picker: false,
            accent_pattern_index: 0,
            beat_sound: BeatSound::Simple,
            show_bpm_entry: false,
        }
    }
}

impl MetronomeState {
    /// The currently selected accent pattern of the time signature.
    pub fn accent_pattern(&self) -> AccentPattern {
        let mut patterns = self.time_signature.accent_patterns();
        let index = self.accent_pattern_index % patterns.len();
        patterns.swap_remove(index)
    }

    /// Position of the BPM within its range, 0.0 at 30 and 1.0 at 240.
    pub fn bpm_fraction(&self) -> f64 {
        (self.bpm - BPM_MIN) as f64 / (BPM_MAX - BPM_MIN) as f64
    }

    pub fn beat_progress(&self) -> f64 {
        if self.time_signature.beats == 0 {
            return 0.0;
        }
        self.current_beat as f64 / self.time_signature.beats as f64
    }

    pub fn settings(&self) -> MetronomeSettings {
        MetronomeSettings {
            bpm: self.bpm,
            time_signature: self.time_signature,
            beat_sound: self.beat_sound,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetronomeAction {
    // User
    PlayTapped,
    StopTapped,
    BpmPlus,
    BpmMinus,
    BpmSet(i32),
    DialDragStarted,
    DialDragged { angle: f64 },
    DialDragEnded,
    TapTempoPressed(Instant),
    TimeSignatureChanged(TimeSignature),
    ToggleTimeSignaturePicker,
    AccentPatternCycled,
    BeatSoundChanged(BeatSound),
    BpmEntryTapped,
    BpmEntryDismissed,
    BpmEntryConfirmed(i32),

    // System
    EngineTick { beat: u32 },
    AppBecameInactive,
    PersistRequested,
    SettingsLoaded(MetronomeSettings),
    LoadSettings,
    EngineStartFailed,
}
