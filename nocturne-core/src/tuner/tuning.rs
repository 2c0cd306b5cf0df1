//! # Tuning Module
//!
//! Equal-temperament note math and the instrument tuning tables used by the
//! tuner.
//!
//! ## Features
//! - MIDI note to name/octave/frequency conversion against a calibrated A4
//! - Nearest-note lookup with cent deviation for raw frequencies
//! - Guitar, bass and ukulele presets stored as MIDI notes, so string
//!   frequencies always follow the current A4 calibration

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIDI note of A4.
pub const A4_MIDI: i32 = 69;

/// One of the twelve pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteName {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl NoteName {
    const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
    ];

    /// Pitch class of a MIDI note. Negative notes wrap like positive ones.
    pub fn from_midi(midi: i32) -> NoteName {
        NoteName::ALL[midi.rem_euclid(12) as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::B => "B",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display names ("C-1" to "G9") for all 128 MIDI notes, built once.
static MIDI_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    (0..128)
        .map(|midi| format!("{}{}", NoteName::from_midi(midi), octave(midi)))
        .collect()
});

/// Octave number of a MIDI note (MIDI 60 is C4).
pub fn octave(midi: i32) -> i32 {
    midi.div_euclid(12) - 1
}

/// Equal-temperament frequency of a MIDI note.
///
/// # Arguments
/// * `midi` - MIDI note number
/// * `a4` - Reference frequency of A4 in Hz
pub fn frequency(midi: i32, a4: f64) -> f64 {
    a4 * 2.0_f64.powf((midi - A4_MIDI) as f64 / 12.0)
}

/// Name and octave such as `"A4"`.
pub fn display_name(midi: i32) -> String {
    match usize::try_from(midi).ok().and_then(|i| MIDI_NAMES.get(i)) {
        Some(name) => name.clone(),
        None => format!("{}{}", NoteName::from_midi(midi), octave(midi)),
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// Finds the MIDI note closest to `freq` and the offset from it in cents.
///
/// # Arguments
/// * `freq` - Input frequency in Hz, must be positive
/// * `a4` - Reference frequency of A4 in Hz
///
/// # Returns
/// * `Some((midi, cents))` with cents in `[-50, 50]`, or `None` for a
///   non-positive or non-finite frequency
pub fn nearest_midi(freq: f64, a4: f64) -> Option<(i32, f64)> {
    if !(freq > 0.0 && freq.is_finite()) {
        return None;
    }
    let exact = A4_MIDI as f64 + 12.0 * (freq / a4).log2();
    let midi = exact.round() as i32;
    Some((midi, cents_deviation(freq, frequency(midi, a4))))
}

/// Instruments offered by the reference-tone mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Instrument {
    Guitar,
    Bass,
    Ukulele,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Guitar, Instrument::Bass, Instrument::Ukulele];

    pub fn key(&self) -> &'static str {
        match self {
            Instrument::Guitar => "guitar",
            Instrument::Bass => "bass",
            Instrument::Ukulele => "ukulele",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Instrument::Guitar => "Guitar",
            Instrument::Bass => "Bass",
            Instrument::Ukulele => "Ukulele",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Instrument::ALL
            .into_iter()
            .find(|i| i.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown instrument '{}'", s))
    }
}

/// A named tuning belonging to exactly one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TuningPreset {
    GuitarStandard,
    GuitarDropD,
    GuitarOpenG,
    BassStandard,
    BassDropD,
    UkuleleStandardC,
    UkuleleLowG,
}

impl TuningPreset {
    pub const ALL: [TuningPreset; 7] = [
        TuningPreset::GuitarStandard,
        TuningPreset::GuitarDropD,
        TuningPreset::GuitarOpenG,
        TuningPreset::BassStandard,
        TuningPreset::BassDropD,
        TuningPreset::UkuleleStandardC,
        TuningPreset::UkuleleLowG,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            TuningPreset::GuitarStandard => "guitarStandard",
            TuningPreset::GuitarDropD => "guitarDropD",
            TuningPreset::GuitarOpenG => "guitarOpenG",
            TuningPreset::BassStandard => "bassStandard",
            TuningPreset::BassDropD => "bassDropD",
            TuningPreset::UkuleleStandardC => "ukuleleStandardC",
            TuningPreset::UkuleleLowG => "ukuleleLowG",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TuningPreset::GuitarStandard | TuningPreset::BassStandard => "Standard",
            TuningPreset::GuitarDropD | TuningPreset::BassDropD => "Drop D",
            TuningPreset::GuitarOpenG => "Open G",
            TuningPreset::UkuleleStandardC => "Standard C",
            TuningPreset::UkuleleLowG => "Low G",
        }
    }

    pub fn instrument(&self) -> Instrument {
        match self {
            TuningPreset::GuitarStandard | TuningPreset::GuitarDropD | TuningPreset::GuitarOpenG => {
                Instrument::Guitar
            }
            TuningPreset::BassStandard | TuningPreset::BassDropD => Instrument::Bass,
            TuningPreset::UkuleleStandardC | TuningPreset::UkuleleLowG => Instrument::Ukulele,
        }
    }

    /// MIDI notes of the strings, string 1 first.
    pub fn midi_notes(&self) -> &'static [i32] {
        match self {
            TuningPreset::GuitarStandard => &[40, 45, 50, 55, 59, 64],
            TuningPreset::GuitarDropD => &[38, 45, 50, 55, 59, 64],
            TuningPreset::GuitarOpenG => &[38, 43, 50, 55, 59, 62],
            TuningPreset::BassStandard => &[28, 33, 38, 43],
            TuningPreset::BassDropD => &[26, 33, 38, 43],
            // Re-entrant: the G string sits above C.
            TuningPreset::UkuleleStandardC => &[67, 60, 64, 69],
            TuningPreset::UkuleleLowG => &[55, 60, 64, 69],
        }
    }
}

impl fmt::Display for TuningPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.instrument(), self.display_name())
    }
}

impl FromStr for TuningPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TuningPreset::ALL
            .into_iter()
            .find(|t| t.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tuning '{}'", s))
    }
}

/// One string of a tuning, with its frequency at the current calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningString {
    /// 1-based string number.
    pub string_number: usize,
    /// Note name with octave, e.g. `"E2"`.
    pub note_name: String,
    pub midi_note: i32,
    pub frequency: f64,
}

/// Lookup of tuning presets and their strings.
pub struct TuningDatabase;

impl TuningDatabase {
    /// Strings of `preset`, frequencies computed against `a4`.
    pub fn strings(preset: TuningPreset, a4: f64) -> Vec<TuningString> {
        preset
            .midi_notes()
            .iter()
            .enumerate()
            .map(|(index, &midi)| TuningString {
                string_number: index + 1,
                note_name: display_name(midi),
                midi_note: midi,
                frequency: frequency(midi, a4),
            })
            .collect()
    }

    /// Presets available for `instrument`, in display order.
    pub fn presets(instrument: Instrument) -> Vec<TuningPreset> {
        TuningPreset::ALL
            .into_iter()
            .filter(|preset| preset.instrument() == instrument)
            .collect()
    }

    pub fn default_tuning(instrument: Instrument) -> TuningPreset {
        match instrument {
            Instrument::Guitar => TuningPreset::GuitarStandard,
            Instrument::Bass => TuningPreset::BassStandard,
            Instrument::Ukulele => TuningPreset::UkuleleStandardC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn a4_and_middle_c() {
        assert_eq!(NoteName::from_midi(69), NoteName::A);
        assert_eq!(octave(69), 4);
        assert_eq!(display_name(60), "C4");
        assert_eq!(display_name(61), "C#4");
        assert_relative_eq!(frequency(69, 440.0), 440.0);
        assert_relative_eq!(frequency(60, 440.0), 261.6256, epsilon = 1e-3);
    }

    #[test]
    fn guitar_standard_strings() {
        let strings = TuningDatabase::strings(TuningPreset::GuitarStandard, 440.0);
        let names: Vec<&str> = strings.iter().map(|s| s.note_name.as_str()).collect();
        assert_eq!(names, ["E2", "A2", "D3", "G3", "B3", "E4"]);
        assert_eq!(strings[0].string_number, 1);
        assert_relative_eq!(strings[0].frequency, 82.4069, epsilon = 1e-3);
    }

    #[test]
    fn string_frequencies_follow_calibration() {
        let strings = TuningDatabase::strings(TuningPreset::UkuleleStandardC, 432.0);
        assert_eq!(strings[3].note_name, "A4");
        assert_relative_eq!(strings[3].frequency, 432.0);
    }

    #[test]
    fn presets_belong_to_their_instrument() {
        assert_eq!(
            TuningDatabase::presets(Instrument::Bass),
            vec![TuningPreset::BassStandard, TuningPreset::BassDropD]
        );
        for instrument in Instrument::ALL {
            let default = TuningDatabase::default_tuning(instrument);
            assert_eq!(default.instrument(), instrument);
            assert!(TuningDatabase::presets(instrument).contains(&default));
        }
    }

    #[test]
    fn nearest_midi_reports_cents() {
        let (midi, cents) = nearest_midi(440.0, 440.0).unwrap();
        assert_eq!(midi, 69);
        assert_relative_eq!(cents, 0.0, epsilon = 1e-9);

        // Just under a quarter tone sharp still rounds to A4.
        let (midi, cents) = nearest_midi(440.0 * 2.0_f64.powf(0.49 / 12.0), 440.0).unwrap();
        assert_eq!(midi, 69);
        assert_relative_eq!(cents, 49.0, epsilon = 1e-6);

        assert!(nearest_midi(0.0, 440.0).is_none());
        assert!(nearest_midi(-1.0, 440.0).is_none());
    }
}
