use super::effects::TunerEffects;
use super::state::{clamp_a4, DetectedPitch, TunerAction, TunerState};
use super::tuning::TuningDatabase;
use crate::effect::Effect;
use crate::pitch::MicPermission;
use crate::store::Reducer;

/// State transitions of the tuner screen.
pub struct TunerReducer {
    effects: TunerEffects,
}

impl TunerReducer {
    pub fn new(effects: TunerEffects) -> Self {
        Self { effects }
    }

    fn stop_listening(&self, state: &mut TunerState) -> Effect<TunerAction> {
        state.is_listening = false;
        state.detected_pitch = None;
        state.pitch_stability = 0.0;
        self.effects.stop_pitch_detection()
    }

    /// Stops listening and tone playback, whichever is active.
    fn stop_all(&self, state: &mut TunerState) -> Effect<TunerAction> {
        let mut effects = Vec::new();
        if state.is_listening {
            effects.push(self.stop_listening(state));
        }
        if state.playing_string_index.take().is_some() {
            effects.push(self.effects.stop_tone());
        }
        Effect::merge(effects)
    }

    fn start_listening(&self, state: &mut TunerState) -> Effect<TunerAction> {
        state.is_listening = true;
        self.effects.start_pitch_detection()
    }
}

impl Reducer for TunerReducer {
    type State = TunerState;
    type Action = TunerAction;

    const NAME: &'static str = "tuner";

    fn reduce(&self, state: &mut TunerState, action: TunerAction) -> Effect<TunerAction> {
        use TunerAction::*;

        match action {
            ModeChanged(mode) => {
                if mode == state.mode {
                    return Effect::None;
                }
                state.mode = mode;
                self.stop_all(state)
            }

            StartListening => match state.mic_permission {
                MicPermission::Authorized => self.start_listening(state),
                MicPermission::Denied => Effect::None,
                MicPermission::NotDetermined => self.effects.request_mic_permission(),
            },

            StopListening => self.stop_listening(state),

            PitchDetected(reading) => {
                let Some(pitch) = DetectedPitch::from_reading(&reading) else {
                    log::trace!("Discarding out of range reading {:?}", reading);
                    return Effect::None;
                };
                state.detected_pitch = Some(pitch);
                state.pitch_stability = reading.stability;
                Effect::None
            }

            PitchLost => {
                // Keep the last note on screen through short dropouts.
                state.pitch_stability = 0.0;
                Effect::None
            }

            MicPermissionUpdated(status) => {
                state.mic_permission = status;
                if status == MicPermission::Authorized {
                    self.start_listening(state)
                } else {
                    Effect::None
                }
            }

            MicListenFailed => {
                state.is_listening = false;
                state.detected_pitch = None;
                state.pitch_stability = 0.0;
                Effect::None
            }

            InstrumentChanged(instrument) => {
                if instrument == state.selected_instrument {
                    return Effect::None;
                }
                state.selected_instrument = instrument;
                state.selected_tuning = TuningDatabase::default_tuning(instrument);
                state.playing_string_index = None;
                Effect::merge([self.effects.stop_tone(), self.effects.debounced_persist()])
            }

            TuningChanged(tuning) => {
                if tuning == state.selected_tuning {
                    return Effect::None;
                }
                state.selected_tuning = tuning;
                state.playing_string_index = None;
                Effect::merge([self.effects.stop_tone(), self.effects.debounced_persist()])
            }

            StringTapped(index) => {
                let strings = state.current_strings();
                let Some(string) = strings.get(index) else {
                    return Effect::None;
                };
                if state.playing_string_index == Some(index) {
                    state.playing_string_index = None;
                    return self.effects.stop_tone();
                }
                state.playing_string_index = Some(index);
                self.effects.play_tone(string.frequency)
            }

            StopTone => {
                state.playing_string_index = None;
                self.effects.stop_tone()
            }

            ToneStarted => Effect::None,

            ToneStopped | TonePlaybackFailed => {
                state.playing_string_index = None;
                Effect::None
            }

            A4CalibrationChanged(a4) => {
                let clamped = clamp_a4(a4);
                if clamped == state.a4_calibration {
                    return Effect::None;
                }
                state.a4_calibration = clamped;
                self.effects.debounced_persist()
            }

            LoadSettings => self.effects.load_settings(),

            SettingsLoaded(settings) => {
                state.selected_instrument = settings.instrument;
                state.selected_tuning = settings.tuning;
                state.a4_calibration = clamp_a4(settings.a4);
                Effect::None
            }

            PersistRequested => self.effects.persist(state.settings()),

            StopAll => self.stop_all(state),
        }
    }
}
