use super::tuning::{self, Instrument, NoteName, TuningDatabase, TuningPreset, TuningString};
use crate::pitch::{MicPermission, PitchReading};
use crate::settings::TunerSettings;
use std::fmt;

pub const A4_MIN: f64 = 430.0;
pub const A4_MAX: f64 = 450.0;

pub fn clamp_a4(a4: f64) -> f64 {
    if a4.is_nan() {
        return 440.0;
    }
    a4.clamp(A4_MIN, A4_MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TunerMode {
    #[default]
    Microphone,
    ReferenceTone,
}

impl TunerMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            TunerMode::Microphone => "Microphone",
            TunerMode::ReferenceTone => "Reference",
        }
    }
}

/// The last accepted pitch, derived from a [`PitchReading`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedPitch {
    pub frequency: f64,
    pub note_name: NoteName,
    pub octave: i32,
    pub cents: f64,
    pub confidence: f64,
    pub midi_note: i32,
}

impl DetectedPitch {
    /// Returns `None` for readings outside the MIDI range.
    pub fn from_reading(reading: &PitchReading) -> Option<Self> {
        if !(0..=127).contains(&reading.midi) {
            return None;
        }
        Some(Self {
            frequency: reading.hz,
            note_name: NoteName::from_midi(reading.midi),
            octave: tuning::octave(reading.midi),
            cents: reading.cents,
            confidence: reading.confidence,
            midi_note: reading.midi,
        })
    }
}

impl fmt::Display for DetectedPitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {:+.1} cents ({:.2} Hz)",
            self.note_name, self.octave, self.cents, self.frequency
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunerState {
    pub mode: TunerMode,
    pub mic_permission: MicPermission,
    pub is_listening: bool,
    pub detected_pitch: Option<DetectedPitch>,
    pub pitch_stability: f64,
    pub selected_instrument: Instrument,
    pub selected_tuning: TuningPreset,
    pub playing_string_index: Option<usize>,
    pub a4_calibration: f64,
}

impl Default for TunerState {
    fn default() -> Self {
        Self {
            mode: TunerMode::Microphone,
            mic_permission: MicPermission::NotDetermined,
            is_listening: false,
            detected_pitch: None,
            pitch_stability: 0.0,
            selected_instrument: Instrument::Guitar,
            selected_tuning: TuningPreset::GuitarStandard,
            playing_string_index: None,
            a4_calibration: 440.0,
        }
    }
}

impl TunerState {
    /// Strings of the selected tuning at the current calibration.
    pub fn current_strings(&self) -> Vec<TuningString> {
        TuningDatabase::strings(self.selected_tuning, self.a4_calibration)
    }

    pub fn settings(&self) -> TunerSettings {
        TunerSettings {
            instrument: self.selected_instrument,
            tuning: self.selected_tuning,
            a4: self.a4_calibration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TunerAction {
    // Mode
    ModeChanged(TunerMode),

    // Microphone
    StartListening,
    StopListening,
    PitchDetected(PitchReading),
    PitchLost,
    MicPermissionUpdated(MicPermission),
    MicListenFailed,

    // Reference tone
    InstrumentChanged(Instrument),
    TuningChanged(TuningPreset),
    StringTapped(usize),
    StopTone,
    ToneStarted,
    ToneStopped,
    TonePlaybackFailed,

    // Calibration
    A4CalibrationChanged(f64),

    // Settings
    LoadSettings,
    SettingsLoaded(TunerSettings),
    PersistRequested,

    // Lifecycle
    StopAll,
}
