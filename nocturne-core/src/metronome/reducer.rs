use super::effects::MetronomeEffects;
use super::state::{
    clamp_bpm, MetronomeAction, MetronomeState, BPM_MAX, BPM_MIN, TAP_HISTORY, TAP_RESET_SECS,
};
use crate::audio::ClickConfig;
use crate::effect::Effect;
use crate::store::Reducer;
use std::f64::consts::TAU;

/// State transitions of the metronome screen.
pub struct MetronomeReducer {
    effects: MetronomeEffects,
}

impl MetronomeReducer {
    pub fn new(effects: MetronomeEffects) -> Self {
        Self { effects }
    }

    fn click_config(state: &MetronomeState) -> ClickConfig {
        ClickConfig {
            bpm: state.bpm,
            beats_per_measure: state.time_signature.beats,
            accent_pattern: state.accent_pattern().to_vec(),
            beat_sound: state.beat_sound,
        }
    }

    /// Live tempo update while playing, plus persistence.
    fn bpm_did_change(&self, state: &MetronomeState) -> Effect<MetronomeAction> {
        let persist = self.effects.debounced_persist();
        if state.is_playing {
            Effect::merge([self.effects.update_tempo(state.bpm), persist])
        } else {
            persist
        }
    }

    fn set_bpm(&self, state: &mut MetronomeState, bpm: i64) -> Effect<MetronomeAction> {
        let clamped = clamp_bpm(bpm);
        if clamped == state.bpm {
            return Effect::None;
        }
        state.bpm = clamped;
        self.bpm_did_change(state)
    }

    fn tap(&self, state: &mut MetronomeState, at: std::time::Instant) -> Effect<MetronomeAction> {
        if let Some(&last) = state.tap_timestamps.last() {
            if at.saturating_duration_since(last).as_secs_f64() > TAP_RESET_SECS {
                state.tap_timestamps = vec![at];
                return Effect::None;
            }
        }
        state.tap_timestamps.push(at);
        if state.tap_timestamps.len() > TAP_HISTORY {
            let excess = state.tap_timestamps.len() - TAP_HISTORY;
            state.tap_timestamps.drain(..excess);
        }
        if state.tap_timestamps.len() < 2 {
            return Effect::None;
        }

        let intervals: Vec<f64> = state
            .tap_timestamps
            .windows(2)
            .map(|pair| pair[1].saturating_duration_since(pair[0]).as_secs_f64())
            .collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if mean <= 0.0 {
            return Effect::None;
        }
        state.bpm = clamp_bpm((60.0 / mean).round() as i64);
        self.bpm_did_change(state)
    }
}

impl Reducer for MetronomeReducer {
    type State = MetronomeState;
    type Action = MetronomeAction;

    const NAME: &'static str = "metronome";

    fn reduce(&self, state: &mut MetronomeState, action: MetronomeAction) -> Effect<MetronomeAction> {
        use MetronomeAction::*;

        match action {
            PlayTapped => {
                state.is_playing = true;
                state.current_beat = 0;
                self.effects.start_engine(Self::click_config(state))
            }

            StopTapped => {
                state.is_playing = false;
                state.current_beat = 0;
                self.effects.stop_engine()
            }

            BpmPlus => self.set_bpm(state, state.bpm as i64 + 1),
            BpmMinus => self.set_bpm(state, state.bpm as i64 - 1),
            BpmSet(bpm) => self.set_bpm(state, bpm as i64),

            DialDragStarted => {
                state.is_dragging = true;
                Effect::None
            }

            DialDragged { angle } => {
                let span = (BPM_MAX - BPM_MIN) as f64;
                let offset = ((angle / TAU) * span).floor();
                state.bpm = clamp_bpm(BPM_MIN as i64 + offset as i64);
                state.dial_angle = angle;
                if state.is_playing {
                    self.effects.update_tempo(state.bpm)
                } else {
                    Effect::None
                }
            }

            DialDragEnded => {
                state.is_dragging = false;
                self.effects.debounced_persist()
            }

            TapTempoPressed(at) => self.tap(state, at),

            TimeSignatureChanged(time_signature) => {
                if time_signature == state.time_signature {
                    return Effect::None;
                }
                state.time_signature = time_signature;
                state.current_beat = 0;
                state.accent_pattern_index = 0;
                let persist = self.effects.debounced_persist();
                if state.is_playing {
                    // Replacing the tick stream restarts the engine with the new measure.
                    Effect::merge([self.effects.start_engine(Self::click_config(state)), persist])
                } else {
                    persist
                }
            }

            ToggleTimeSignaturePicker => {
                state.show_time_signature_picker = !state.show_time_signature_picker;
                Effect::None
            }

            AccentPatternCycled => {
                let count = state.time_signature.accent_patterns().len();
                if count <= 1 {
                    return Effect::None;
                }
                state.accent_pattern_index = (state.accent_pattern_index + 1) % count;
                if state.is_playing {
                    self.effects.update_accent_pattern(state.accent_pattern().to_vec())
                } else {
                    Effect::None
                }
            }

            BeatSoundChanged(sound) => {
                if sound == state.beat_sound {
                    return Effect::None;
                }
                state.beat_sound = sound;
                let persist = self.effects.debounced_persist();
                if state.is_playing {
                    Effect::merge([self.effects.update_beat_sound(sound), persist])
                } else {
                    persist
                }
            }

            BpmEntryTapped => {
                state.show_bpm_entry = true;
                Effect::None
            }

            BpmEntryDismissed => {
                state.show_bpm_entry = false;
                Effect::None
            }

            BpmEntryConfirmed(bpm) => {
                state.show_bpm_entry = false;
                self.set_bpm(state, bpm as i64)
            }

            EngineTick { beat } => {
                state.current_beat = beat % state.time_signature.beats.max(1);
                Effect::None
            }

            AppBecameInactive => {
                if !state.is_playing {
                    return Effect::None;
                }
                state.is_playing = false;
                state.current_beat = 0;
                self.effects.stop_engine()
            }

            PersistRequested => self.effects.persist(state.settings()),

            SettingsLoaded(settings) => {
                state.bpm = clamp_bpm(settings.bpm as i64);
                state.time_signature = settings.time_signature;
                state.beat_sound = settings.beat_sound;
                Effect::None
            }

            LoadSettings => self.effects.load_settings(),

            EngineStartFailed => {
                state.is_playing = false;
                state.current_beat = 0;
                Effect::None
            }
        }
    }
}
