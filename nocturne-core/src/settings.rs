//! # Settings Module
//!
//! The persisted-settings collaborator. Reducers never touch storage directly;
//! they schedule a debounced `PersistRequested` and the effect layer calls
//! into a [`SettingsStore`] injected at construction.
//!
//! [`JsonSettingsStore`] keeps a flat JSON object of key–value pairs keyed by
//! logical setting name, e.g. `"nocturne.bpm": 120`. Missing or invalid values
//! fall back to defaults on load, so a damaged file never blocks startup.

use crate::error::SettingsError;
use crate::metronome::{BeatSound, TimeSignature};
use crate::tuner::{Instrument, TuningDatabase, TuningPreset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const KEY_BPM: &str = "nocturne.bpm";
const KEY_TS_BEATS: &str = "nocturne.ts.beats";
const KEY_TS_NOTE_VALUE: &str = "nocturne.ts.noteValue";
const KEY_BEAT_SOUND: &str = "nocturne.beatSound";
const KEY_INSTRUMENT: &str = "nocturne.tuner.instrument";
const KEY_TUNING: &str = "nocturne.tuner.tuning";
const KEY_A4: &str = "nocturne.tuner.a4";

/// Persisted metronome settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetronomeSettings {
    pub bpm: u32,
    pub time_signature: TimeSignature,
    pub beat_sound: BeatSound,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            bpm: 120,
            time_signature: TimeSignature::FOUR_FOUR,
            beat_sound: BeatSound::Simple,
        }
    }
}

/// Persisted tuner settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunerSettings {
    pub instrument: Instrument,
    pub tuning: TuningPreset,
    pub a4: f64,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            instrument: Instrument::Guitar,
            tuning: TuningPreset::GuitarStandard,
            a4: 440.0,
        }
    }
}

/// Load/save interface consumed by the reducers' effects.
///
/// Loads are infallible: an implementation returns defaults for anything it
/// cannot read.
pub trait SettingsStore: Send + Sync {
    fn load_metronome(&self) -> MetronomeSettings;
    fn save_metronome(&self, settings: &MetronomeSettings) -> Result<(), SettingsError>;
    fn load_tuner(&self) -> TunerSettings;
    fn save_tuner(&self, settings: &TunerSettings) -> Result<(), SettingsError>;
}

/// Settings kept as a JSON object in a single file.
pub struct JsonSettingsStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<config dir>/nocturne/settings.json`, or `./nocturne-settings.json`
    /// when the platform has no config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("nocturne").join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("nocturne-settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, SettingsError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        match serde_json::from_str::<Value>(&data) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(source) => Err(SettingsError::Json {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Reads the file, tolerating absence and corruption.
    fn load_map(&self) -> Map<String, Value> {
        let _guard = self.lock.lock();
        match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                log::warn!("Ignoring unreadable settings, using defaults: {}", e);
                Map::new()
            }
        }
    }

    fn update(&self, entries: &[(&str, Value)]) -> Result<(), SettingsError> {
        let _guard = self.lock.lock();
        // A corrupt file is replaced rather than blocking every future save.
        let mut map = self.read_map().unwrap_or_default();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json_string = serde_json::to_string_pretty(&Value::Object(map)).map_err(|source| {
            SettingsError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json_string).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn positive_u32(map: &Map<String, Value>, key: &str) -> Option<u32> {
    map.get(key)
        .and_then(Value::as_u64)
        .filter(|&v| v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

fn parse_str<T: serde::de::DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    map.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
}

impl SettingsStore for JsonSettingsStore {
    fn load_metronome(&self) -> MetronomeSettings {
        let map = self.load_map();
        let defaults = MetronomeSettings::default();
        let time_signature = match positive_u32(&map, KEY_TS_BEATS) {
            Some(beats) => TimeSignature::new(beats, positive_u32(&map, KEY_TS_NOTE_VALUE).unwrap_or(4)),
            None => defaults.time_signature,
        };
        MetronomeSettings {
            bpm: positive_u32(&map, KEY_BPM).unwrap_or(defaults.bpm),
            time_signature,
            beat_sound: parse_str(&map, KEY_BEAT_SOUND).unwrap_or(defaults.beat_sound),
        }
    }

    fn save_metronome(&self, settings: &MetronomeSettings) -> Result<(), SettingsError> {
        self.update(&[
            (KEY_BPM, Value::from(settings.bpm)),
            (KEY_TS_BEATS, Value::from(settings.time_signature.beats)),
            (KEY_TS_NOTE_VALUE, Value::from(settings.time_signature.note_value)),
            (KEY_BEAT_SOUND, Value::from(settings.beat_sound.key())),
        ])
    }

    fn load_tuner(&self) -> TunerSettings {
        let map = self.load_map();
        let instrument: Instrument = parse_str(&map, KEY_INSTRUMENT).unwrap_or(Instrument::Guitar);
        let tuning = parse_str::<TuningPreset>(&map, KEY_TUNING)
            .filter(|tuning| tuning.instrument() == instrument)
            .unwrap_or_else(|| TuningDatabase::default_tuning(instrument));
        let a4 = map
            .get(KEY_A4)
            .and_then(Value::as_f64)
            .filter(|&a4| a4 > 0.0)
            .unwrap_or(440.0);
        TunerSettings { instrument, tuning, a4 }
    }

    fn save_tuner(&self, settings: &TunerSettings) -> Result<(), SettingsError> {
        self.update(&[
            (KEY_INSTRUMENT, Value::from(settings.instrument.key())),
            (KEY_TUNING, Value::from(settings.tuning.key())),
            (KEY_A4, Value::from(settings.a4)),
        ])
    }
}

/// Settings held in memory only. Used with `--no-persist` and in tests.
#[derive(Default)]
pub struct MemorySettingsStore {
    metronome: Mutex<Option<MetronomeSettings>>,
    tuner: Mutex<Option<TunerSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_metronome(&self) -> MetronomeSettings {
        self.metronome.lock().unwrap_or_default()
    }

    fn save_metronome(&self, settings: &MetronomeSettings) -> Result<(), SettingsError> {
        *self.metronome.lock() = Some(*settings);
        Ok(())
    }

    fn load_tuner(&self) -> TunerSettings {
        self.tuner.lock().unwrap_or_default()
    }

    fn save_tuner(&self, settings: &TunerSettings) -> Result<(), SettingsError> {
        *self.tuner.lock() = Some(*settings);
        Ok(())
    }
}
