//! Static metronome data: time signatures, accent patterns and click timbres.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A time signature such as 4/4 or 7/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSignature {
    pub beats: u32,
    pub note_value: u32,
}

impl TimeSignature {
    pub const TWO_FOUR: TimeSignature = TimeSignature::new(2, 4);
    pub const THREE_FOUR: TimeSignature = TimeSignature::new(3, 4);
    pub const FOUR_FOUR: TimeSignature = TimeSignature::new(4, 4);
    pub const FIVE_FOUR: TimeSignature = TimeSignature::new(5, 4);
    pub const SIX_EIGHT: TimeSignature = TimeSignature::new(6, 8);
    pub const SEVEN_EIGHT: TimeSignature = TimeSignature::new(7, 8);

    /// The signatures offered by the picker, in display order.
    pub const PRESETS: [TimeSignature; 6] = [
        TimeSignature::TWO_FOUR,
        TimeSignature::THREE_FOUR,
        TimeSignature::FOUR_FOUR,
        TimeSignature::FIVE_FOUR,
        TimeSignature::SIX_EIGHT,
        TimeSignature::SEVEN_EIGHT,
    ];

    pub const fn new(beats: u32, note_value: u32) -> Self {
        Self { beats, note_value }
    }

    /// Accent patterns available for this signature. Never empty.
    pub fn accent_patterns(&self) -> Vec<AccentPattern> {
        const T: bool = true;
        const F: bool = false;
        let table: &[&[bool]] = match (self.beats, self.note_value) {
            (2, 4) => &[&[T, F]],
            (3, 4) => &[&[T, F, F], &[T, F, T]],
            (4, 4) => &[&[T, F, F, F], &[T, F, T, F], &[T, F, F, T]],
            (5, 4) => &[&[T, F, F, T, F], &[T, F, T, F, F], &[T, F, F, F, F]],
            (6, 8) => &[&[T, F, F, T, F, F], &[T, F, F, F, F, F]],
            (7, 8) => &[
                &[T, F, T, F, T, F, F],
                &[T, F, F, T, F, T, F],
                &[T, F, F, T, F, F, F],
                &[T, F, F, F, F, F, F],
            ],
            _ => {
                // Accent on the downbeat only.
                let mut pattern = vec![false; self.beats.max(1) as usize];
                pattern[0] = true;
                return vec![AccentPattern::new(pattern)];
            }
        };
        table.iter().map(|p| AccentPattern::new(p.to_vec())).collect()
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::FOUR_FOUR
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.note_value)
    }
}

impl FromStr for TimeSignature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (beats, note_value) = s
            .split_once('/')
            .ok_or_else(|| format!("expected beats/noteValue, got '{}'", s))?;
        let beats: u32 = beats.trim().parse().map_err(|_| format!("invalid beats '{}'", beats))?;
        let note_value: u32 = note_value
            .trim()
            .parse()
            .map_err(|_| format!("invalid note value '{}'", note_value))?;
        if beats == 0 || note_value == 0 {
            return Err(format!("time signature {} must be positive", s));
        }
        Ok(TimeSignature::new(beats, note_value))
    }
}

/// Which beats of a measure are accented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccentPattern {
    pattern: Vec<bool>,
}

impl AccentPattern {
    pub fn new(pattern: Vec<bool>) -> Self {
        Self { pattern }
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.pattern
    }

    pub fn to_vec(&self) -> Vec<bool> {
        self.pattern.clone()
    }

    /// Sizes of the beat groups, each group starting at an accent.
    ///
    /// `[T, F, F, T, F]` groups as `[3, 2]`.
    pub fn groups(&self) -> Vec<usize> {
        if self.pattern.len() <= 1 {
            return vec![self.pattern.len()];
        }
        let mut groups = Vec::new();
        let mut size = 1;
        for &accent in &self.pattern[1..] {
            if accent {
                groups.push(size);
                size = 1;
            } else {
                size += 1;
            }
        }
        groups.push(size);
        groups
    }
}

/// Click timbre. Each sound has an accent and a normal sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeatSound {
    #[default]
    Simple,
    SimpleBright,
    Classic,
    ClassicBright,
    Seiko,
    Alarm,
    Digital,
    DigitalBright,
    DigitalSoft,
    DigitalSoft2,
}

impl BeatSound {
    pub const ALL: [BeatSound; 10] = [
        BeatSound::Simple,
        BeatSound::SimpleBright,
        BeatSound::Classic,
        BeatSound::ClassicBright,
        BeatSound::Seiko,
        BeatSound::Alarm,
        BeatSound::Digital,
        BeatSound::DigitalBright,
        BeatSound::DigitalSoft,
        BeatSound::DigitalSoft2,
    ];

    /// Stable identifier used in the settings file.
    pub fn key(&self) -> &'static str {
        match self {
            BeatSound::Simple => "simple",
            BeatSound::SimpleBright => "simpleBright",
            BeatSound::Classic => "classic",
            BeatSound::ClassicBright => "classicBright",
            BeatSound::Seiko => "seiko",
            BeatSound::Alarm => "alarm",
            BeatSound::Digital => "digital",
            BeatSound::DigitalBright => "digitalBright",
            BeatSound::DigitalSoft => "digitalSoft",
            BeatSound::DigitalSoft2 => "digitalSoft2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BeatSound::Simple => "Simple Click",
            BeatSound::SimpleBright => "Simple Click (Bright)",
            BeatSound::Classic => "Classic Metronome",
            BeatSound::ClassicBright => "Classic Metronome (Bright)",
            BeatSound::Seiko => "Mechanical Tick",
            BeatSound::Alarm => "Alarm Beep",
            BeatSound::Digital => "Digital Click",
            BeatSound::DigitalBright => "Digital Click (Bright)",
            BeatSound::DigitalSoft => "Digital Click (Soft)",
            BeatSound::DigitalSoft2 => "Digital Click (Warm)",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            BeatSound::Simple => "simple",
            BeatSound::SimpleBright => "simple_bright",
            BeatSound::Classic => "classic",
            BeatSound::ClassicBright => "classic_bright",
            BeatSound::Seiko => "seiko",
            BeatSound::Alarm => "alarm",
            BeatSound::Digital => "digital",
            BeatSound::DigitalBright => "digital_bright",
            BeatSound::DigitalSoft => "digital_soft",
            BeatSound::DigitalSoft2 => "digital_soft_2",
        }
    }

    /// WAV file name (without extension) of the accented click.
    pub fn accent_file_name(&self) -> String {
        format!("{}_accent", self.file_stem())
    }

    /// WAV file name (without extension) of the normal click.
    pub fn normal_file_name(&self) -> String {
        format!("{}_normal", self.file_stem())
    }

    /// Parameters for the built-in click when no sample files are configured:
    /// (base frequency in Hz, length in seconds, decay rate).
    pub(crate) fn synth_voice(&self) -> (f32, f32, f32) {
        match self {
            BeatSound::Simple => (1000.0, 0.030, 120.0),
            BeatSound::SimpleBright => (1600.0, 0.030, 140.0),
            BeatSound::Classic => (800.0, 0.045, 90.0),
            BeatSound::ClassicBright => (1200.0, 0.045, 100.0),
            BeatSound::Seiko => (2400.0, 0.015, 300.0),
            BeatSound::Alarm => (880.0, 0.080, 30.0),
            BeatSound::Digital => (2000.0, 0.020, 200.0),
            BeatSound::DigitalBright => (3000.0, 0.020, 220.0),
            BeatSound::DigitalSoft => (1500.0, 0.025, 260.0),
            BeatSound::DigitalSoft2 => (700.0, 0.035, 150.0),
        }
    }
}

impl fmt::Display for BeatSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BeatSound {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BeatSound::ALL
            .into_iter()
            .find(|sound| sound.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown beat sound '{}'", s))
    }
}
